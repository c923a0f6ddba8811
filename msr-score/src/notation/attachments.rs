use std::{fmt, str::FromStr};

use crate::errors::MsrError;

use super::PromotesToChord;

/// Categories of per-note descriptive elements.
///
/// Their business meaning is not interpreted here: only how they
/// travel between notes and chords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttachmentKind {
    Beam,
    Articulation,
    Dynamic,
    Words,
    Tie,
    Slur,
    Ligature,
    Pedal,
    Technical,
    Ornament,
    Glissando,
    Slide,
    Wedge,
    Slash,
    Lyric,
}
impl AttachmentKind {
    pub fn all() -> [Self; 15] {
        [
            Self::Beam,
            Self::Articulation,
            Self::Dynamic,
            Self::Words,
            Self::Tie,
            Self::Slur,
            Self::Ligature,
            Self::Pedal,
            Self::Technical,
            Self::Ornament,
            Self::Glissando,
            Self::Slide,
            Self::Wedge,
            Self::Slash,
            Self::Lyric,
        ]
    }
}
impl PromotesToChord for AttachmentKind {
    fn promotes_to_chord(&self) -> bool {
        !matches!(self, Self::Wedge | Self::Slash | Self::Lyric)
    }
}
impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Beam => "beam",
            Self::Articulation => "articulation",
            Self::Dynamic => "dynamic",
            Self::Words => "words",
            Self::Tie => "tie",
            Self::Slur => "slur",
            Self::Ligature => "ligature",
            Self::Pedal => "pedal",
            Self::Technical => "technical",
            Self::Ornament => "ornament",
            Self::Glissando => "glissando",
            Self::Slide => "slide",
            Self::Wedge => "wedge",
            Self::Slash => "slash",
            Self::Lyric => "lyric",
        };
        write!(f, "{s}")
    }
}
impl FromStr for AttachmentKind {
    type Err = MsrError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| {
                MsrError::unsupported(0, format!("unknown attachment kind `{s}`"))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Placement {
    #[default]
    Unspecified,
    Above,
    Below,
}

/// One descriptive element attached to a note or a chord.
///
/// Equality ignores the source line: two attachments are duplicates
/// when they say the same thing.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub kind: AttachmentKind,
    /// free-form payload: `"begin"` for a beam, `"mf"` for a dynamic...
    pub value: String,
    pub placement: Placement,
    pub line: usize,
}
impl Attachment {
    pub fn new(kind: AttachmentKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            placement: Placement::Unspecified,
            line: 0,
        }
    }
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
    pub fn placed(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }
}
impl PartialEq for Attachment {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.value == other.value
            && self.placement == other.placement
    }
}
impl Eq for Attachment {}
impl PromotesToChord for Attachment {
    fn promotes_to_chord(&self) -> bool {
        self.kind.promotes_to_chord()
    }
}
impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

/// Ordered attachments of one note or chord.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attachments {
    items: Vec<Attachment>,
}
impl Attachments {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, attachment: Attachment) {
        self.items.push(attachment);
    }
    /// Push, unless an equal attachment is already present.
    ///
    /// # Returns
    /// true if attachment was pushed.
    pub fn push_unique(&mut self, attachment: Attachment) -> bool {
        if self.items.contains(&attachment) {
            return false;
        }
        self.items.push(attachment);
        true
    }
    pub fn contains(&self, attachment: &Attachment) -> bool {
        self.items.contains(attachment)
    }
    pub fn of_kind(
        &self,
        kind: AttachmentKind,
    ) -> impl Iterator<Item = &Attachment> {
        self.items.iter().filter(move |at| at.kind == kind)
    }
    pub fn has_kind(&self, kind: AttachmentKind) -> bool {
        self.of_kind(kind).next().is_some()
    }
    /// Remove and return every attachment of the kind.
    pub fn take_kind(&mut self, kind: AttachmentKind) -> Vec<Attachment> {
        let (taken, kept) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|at| at.kind == kind);
        self.items = kept;
        taken
    }
    pub fn retain(&mut self, keep: impl FnMut(&Attachment) -> bool) {
        self.items.retain(keep);
    }
    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.items.iter()
    }
    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
impl FromIterator<Attachment> for Attachments {
    fn from_iter<T: IntoIterator<Item = Attachment>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
