//! Cell codec - bit-level encoding of a single board cell
//!
//! Every grid position is one `u32`. Mutation is always read-modify-write so
//! unrelated bits survive:
//!
//! | Mask | Field |
//! |------|-------|
//! | `0x0000F` | block type (0-15) |
//! | `0x00070` | power field: bit 0 = offensive, bits 1-2 = severity |
//! | `0x00080` | artificial (placed by a system event) |
//! | `0x00100` | broken (pending removal) |
//! | `0x00200` | partner break |
//! | `0x00400` | special (suppresses power labels) |
//! | `0x00800` | power block |
//! | `0x7F000` | owner id (0-127) |

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::types::{is_letter, EMPTY, MEDUSA, MIDAS, STONE};

const TYPE_MASK: u32 = 0x00F;
const POWER_MASK: u32 = 0x070;
const POWER_SHIFT: u32 = 4;
const OWNER_MASK: u32 = 0x7F000;
const OWNER_SHIFT: u32 = 12;

/// Highest owner id the 7-bit field can hold
pub const MAX_OWNER_ID: u8 = 127;

/// Highest raw power field value
pub const MAX_POWER_FIELD: u8 = 7;

/// Independent single-bit flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellFlag {
    Artificial,
    Broken,
    PartnerBreak,
    Special,
    PowerBlock,
}

impl CellFlag {
    #[inline]
    pub const fn mask(self) -> u32 {
        match self {
            CellFlag::Artificial => 0x080,
            CellFlag::Broken => 0x100,
            CellFlag::PartnerBreak => 0x200,
            CellFlag::Special => 0x400,
            CellFlag::PowerBlock => 0x800,
        }
    }
}

/// Power tier encoded in bits 1-2 of the power field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Minor,
    Regular,
    Mega,
}

impl Severity {
    /// Tier from a raw power field; the unused tier 3 (fields 6 and 7) reads as mega.
    pub fn from_field(field: u8) -> Self {
        match field >> 1 {
            0 => Severity::Minor,
            1 => Severity::Regular,
            _ => Severity::Mega,
        }
    }

    /// Effect magnitude multiplier (minor x1, regular x2, mega x3)
    pub fn magnitude(self) -> u32 {
        match self {
            Severity::Minor => 1,
            Severity::Regular => 2,
            Severity::Mega => 3,
        }
    }

    fn index(self) -> usize {
        match self {
            Severity::Minor => 0,
            Severity::Regular => 1,
            Severity::Mega => 2,
        }
    }
}

/// One encoded board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cell(u32);

impl Cell {
    pub const EMPTY: Cell = Cell(0);

    /// Wrap a raw encoded value (as received from the wire)
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Cell(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Plain block of the given type with every other bit clear
    pub fn block(block_type: u8) -> Result<Self, CodecError> {
        Cell::EMPTY.with_type(block_type)
    }

    #[inline]
    pub fn block_type(self) -> u8 {
        (self.0 & TYPE_MASK) as u8
    }

    pub fn with_type(self, block_type: u8) -> Result<Self, CodecError> {
        if u32::from(block_type) > TYPE_MASK {
            return Err(CodecError::BlockType(u32::from(block_type)));
        }
        Ok(Cell((self.0 & !TYPE_MASK) | u32::from(block_type)))
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.block_type() == EMPTY
    }

    #[inline]
    pub fn has_flag(self, flag: CellFlag) -> bool {
        self.0 & flag.mask() != 0
    }

    #[inline]
    pub fn with_flag(self, flag: CellFlag) -> Self {
        Cell(self.0 | flag.mask())
    }

    #[inline]
    pub fn without_flag(self, flag: CellFlag) -> Self {
        Cell(self.0 & !flag.mask())
    }

    #[inline]
    pub fn power_field(self) -> u8 {
        ((self.0 & POWER_MASK) >> POWER_SHIFT) as u8
    }

    pub fn with_power_field(self, field: u8) -> Result<Self, CodecError> {
        if field > MAX_POWER_FIELD {
            return Err(CodecError::PowerField(u32::from(field)));
        }
        Ok(Cell((self.0 & !POWER_MASK) | (u32::from(field) << POWER_SHIFT)))
    }

    #[inline]
    pub fn is_offensive(self) -> bool {
        self.power_field() & 1 != 0
    }

    /// Raw severity tier (`power_field >> 1`, 0 = minor, 1 = regular, 2 = mega)
    #[inline]
    pub fn power_severity(self) -> u8 {
        self.power_field() >> 1
    }

    pub fn severity(self) -> Severity {
        Severity::from_field(self.power_field())
    }

    #[inline]
    pub fn owner_id(self) -> u8 {
        ((self.0 & OWNER_MASK) >> OWNER_SHIFT) as u8
    }

    pub fn with_owner_id(self, id: u8) -> Result<Self, CodecError> {
        if id > MAX_OWNER_ID {
            return Err(CodecError::OwnerId(u32::from(id)));
        }
        Ok(Cell((self.0 & !OWNER_MASK) | (u32::from(id) << OWNER_SHIFT)))
    }

    /// True for a letter block that carries a usable power
    pub fn is_power(self) -> bool {
        self.has_flag(CellFlag::PowerBlock) && is_letter(self.block_type())
    }

    /// Letter block eligible for matching
    pub fn is_matchable(self) -> bool {
        is_letter(self.block_type())
            && !self.has_flag(CellFlag::Broken)
            && !self.has_flag(CellFlag::Special)
    }

    pub fn is_stone(self) -> bool {
        self.block_type() == STONE
    }

    /// Two-character display label.
    ///
    /// Plain letters render as the letter plus a blank, power blocks as the
    /// letter plus a bracket naming direction and tier (`(` `[` `{` offensive,
    /// `)` `]` `}` defensive). The special flag wins over any power field.
    pub fn label(self) -> &'static str {
        let t = self.block_type();
        if self.has_flag(CellFlag::Special) {
            return match t {
                MEDUSA => "M*",
                MIDAS => "G*",
                _ => "**",
            };
        }
        match t {
            EMPTY => ". ",
            STONE => "##",
            _ if is_letter(t) => {
                let letter = (t - 1) as usize;
                if self.has_flag(CellFlag::PowerBlock) {
                    let dir = usize::from(self.is_offensive());
                    POWER_LABELS[letter][dir][self.severity().index()]
                } else {
                    PLAIN_LABELS[letter]
                }
            }
            MEDUSA => "M ",
            MIDAS => "G ",
            _ => "? ",
        }
    }
}

impl From<Cell> for u32 {
    fn from(cell: Cell) -> Self {
        cell.raw()
    }
}

const PLAIN_LABELS: [&str; 6] = ["Y ", "A ", "H ", "O ", "0 ", "! "];

/// Indexed by [letter][offensive as usize][severity].
const POWER_LABELS: [[[&str; 3]; 2]; 6] = [
    [["Y)", "Y]", "Y}"], ["Y(", "Y[", "Y{"]],
    [["A)", "A]", "A}"], ["A(", "A[", "A{"]],
    [["H)", "H]", "H}"], ["H(", "H[", "H{"]],
    [["O)", "O]", "O}"], ["O(", "O[", "O{"]],
    [["0)", "0]", "0}"], ["0(", "0[", "0{"]],
    [["!)", "!]", "!}"], ["!(", "![", "!{"]],
];
