/// SAM flag: segment unmapped.
pub const FLAG_UNMAPPED: u16 = 0x4;
/// SAM flag: sequence is reverse complemented.
pub const FLAG_REVERSE: u16 = 0x10;
/// SAM flag: secondary alignment.
pub const FLAG_SECONDARY: u16 = 0x100;
/// SAM flag: supplementary alignment.
pub const FLAG_SUPPLEMENTARY: u16 = 0x800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strand {
    #[default]
    Plus,
    Minus,
}

impl Strand {
    pub fn from_flag(flag: u16) -> Self {
        if flag & FLAG_REVERSE != 0 {
            Self::Minus
        } else {
            Self::Plus
        }
    }

    /// Slot of this strand in two-element per-strand arrays.
    pub fn index(self) -> usize {
        match self {
            Self::Plus => 0,
            Self::Minus => 1,
        }
    }
}

/// One read's half-open reference span `[start, end)` plus the fields
/// used for ordering and reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    /// Ordinal of the originating data line; indexes the keep flags.
    pub unit_id: usize,
    pub start: usize,
    pub end: usize,
    pub strand: Strand,
    /// Query bases consumed by the alignment.
    pub length: usize,
    /// Matched bases over query length, in `[0, 1]`.
    pub quality: f64,
}

impl Interval {
    pub fn span_len(&self) -> usize {
        self.end - self.start
    }

    pub fn positions(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// The atomic unit of selection: a single read, or every record sharing
/// a read name when pairs are kept together.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionUnit {
    pub members: Vec<Interval>,
}

impl SelectionUnit {
    pub fn single(interval: Interval) -> Self {
        Self {
            members: vec![interval],
        }
    }

    pub fn push(&mut self, interval: Interval) {
        self.members.push(interval);
    }

    /// Ordering key: sum of member qualities.
    pub fn quality(&self) -> f64 {
        self.members.iter().map(|member| member.quality).sum()
    }

    pub fn unit_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().map(|member| member.unit_id)
    }
}
