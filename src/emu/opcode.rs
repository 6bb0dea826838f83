use crate::{u4, u12};

/// CHIP-8 instruction shapes.
///
/// Each variant is identified by a fixed bit pattern plus the set of operand
/// fields ([`Fields`]) it consumes. Nibbles carrying an operand are masked out
/// before the pattern comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// 00E0 - Clear the display.
    ClearDisplay,
    /// 00EE - Return from a subroutine.
    Return,
    /// 1nnn - Jump to location nnn.
    Jump,
    /// 2nnn - Call subroutine at nnn.
    Call,
    /// 3xkk - Skip next instruction if Vx == kk.
    SkipRegEqualImm,
    /// 4xkk - Skip next instruction if Vx != kk.
    SkipRegNotEqualImm,
    /// 5xy0 - Skip next instruction if Vx == Vy.
    SkipRegEqualReg,
    /// 6xkk - Set Vx = kk.
    SetRegImm,
    /// 7xkk - Set Vx = Vx + kk.
    AddRegImm,
    /// 8xy0 - Set Vx = Vy.
    SetRegReg,
    /// 8xy1 - Set Vx = Vx OR Vy.
    Or,
    /// 8xy2 - Set Vx = Vx AND Vy.
    And,
    /// 8xy3 - Set Vx = Vx XOR Vy.
    Xor,
    /// 8xy4 - Set Vx = Vx + Vy, VF = carry.
    AddRegReg,
    /// 8xy5 - Set Vx = Vx - Vy, VF = NOT borrow.
    Sub,
    /// 8xy6 - Set Vx = Vx >> 1, VF = shifted out bit.
    ShiftRight,
    /// 8xy7 - Set Vx = Vy - Vx, VF = NOT borrow.
    SubReverse,
    /// 8xyE - Set Vx = Vx << 1, VF = shifted out bit.
    ShiftLeft,
    /// 9xy0 - Skip next instruction if Vx != Vy.
    SkipRegNotEqualReg,
    /// Annn - Set I = nnn.
    SetIndexImm,
    /// Bnnn - Jump to location nnn + V0.
    JumpWithOffset,
    /// Cxkk - Set Vx = random byte AND kk.
    Random,
    /// Dxyn - Draw an n-row sprite from memory at I at (Vx, Vy), VF = collision.
    Draw,
    /// Ex9E - Skip next instruction if key Vx is pressed.
    SkipIfPressed,
    /// ExA1 - Skip next instruction if key Vx is not pressed.
    SkipIfNotPressed,
    /// Fx07 - Set Vx = delay timer value.
    ReadDelayTimer,
    /// Fx0A - Block until a key is pressed, store the key in Vx.
    WaitForKey,
    /// Fx15 - Set delay timer = Vx.
    SetDelayTimer,
    /// Fx18 - Set sound timer = Vx.
    SetSoundTimer,
    /// Fx1E - Set I = I + Vx.
    AddIndexReg,
    /// Fx29 - Set I = address of the hex digit glyph for Vx.
    FontChar,
    /// Fx33 - Store the BCD digits of Vx at I, I+1, I+2.
    BCD,
    /// Fx55 - Store V0..=Vx in memory starting at I.
    StoreRegs,
    /// Fx65 - Read V0..=Vx from memory starting at I.
    LoadRegs,
}

/// Which operand fields an opcode consumes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Fields {
    pub nnn: bool,
    pub n: bool,
    pub x: bool,
    pub y: bool,
    pub kk: bool,
}

impl Fields {
    const NONE: Self = Self { nnn: false, n: false, x: false, y: false, kk: false };
    const NNN: Self = Self { nnn: true, ..Self::NONE };
    const X: Self = Self { x: true, ..Self::NONE };
    const XY: Self = Self { x: true, y: true, ..Self::NONE };
    const XKK: Self = Self { x: true, kk: true, ..Self::NONE };
    const XYN: Self = Self { x: true, y: true, n: true, ..Self::NONE };

    /// Mask keeping only the nibbles that carry literal pattern bits.
    pub const fn mask(self) -> u16 {
        let mut mask = 0xFFFF;
        if self.nnn {
            mask &= 0xF000;
        }
        if self.n {
            mask &= 0xFFF0;
        }
        if self.x {
            mask &= 0xF0FF;
        }
        if self.y {
            mask &= 0xFF0F;
        }
        if self.kk {
            mask &= 0xFF00;
        }
        mask
    }
}

impl Opcode {
    /// Every opcode, in decode priority order.
    pub const ALL: [Opcode; 34] = [
        Opcode::ClearDisplay,
        Opcode::Return,
        Opcode::Jump,
        Opcode::Call,
        Opcode::SkipRegEqualImm,
        Opcode::SkipRegNotEqualImm,
        Opcode::SkipRegEqualReg,
        Opcode::SetRegImm,
        Opcode::AddRegImm,
        Opcode::SetRegReg,
        Opcode::Or,
        Opcode::And,
        Opcode::Xor,
        Opcode::AddRegReg,
        Opcode::Sub,
        Opcode::ShiftRight,
        Opcode::SubReverse,
        Opcode::ShiftLeft,
        Opcode::SkipRegNotEqualReg,
        Opcode::SetIndexImm,
        Opcode::JumpWithOffset,
        Opcode::Random,
        Opcode::Draw,
        Opcode::SkipIfPressed,
        Opcode::SkipIfNotPressed,
        Opcode::ReadDelayTimer,
        Opcode::WaitForKey,
        Opcode::SetDelayTimer,
        Opcode::SetSoundTimer,
        Opcode::AddIndexReg,
        Opcode::FontChar,
        Opcode::BCD,
        Opcode::StoreRegs,
        Opcode::LoadRegs,
    ];

    const fn signature(self) -> (u16, Fields) {
        match self {
            Opcode::ClearDisplay => (0x00E0, Fields::NONE),
            Opcode::Return => (0x00EE, Fields::NONE),
            Opcode::Jump => (0x1000, Fields::NNN),
            Opcode::Call => (0x2000, Fields::NNN),
            Opcode::SkipRegEqualImm => (0x3000, Fields::XKK),
            Opcode::SkipRegNotEqualImm => (0x4000, Fields::XKK),
            Opcode::SkipRegEqualReg => (0x5000, Fields::XY),
            Opcode::SetRegImm => (0x6000, Fields::XKK),
            Opcode::AddRegImm => (0x7000, Fields::XKK),
            Opcode::SetRegReg => (0x8000, Fields::XY),
            Opcode::Or => (0x8001, Fields::XY),
            Opcode::And => (0x8002, Fields::XY),
            Opcode::Xor => (0x8003, Fields::XY),
            Opcode::AddRegReg => (0x8004, Fields::XY),
            Opcode::Sub => (0x8005, Fields::XY),
            Opcode::ShiftRight => (0x8006, Fields::XY),
            Opcode::SubReverse => (0x8007, Fields::XY),
            Opcode::ShiftLeft => (0x800E, Fields::XY),
            Opcode::SkipRegNotEqualReg => (0x9000, Fields::XY),
            Opcode::SetIndexImm => (0xA000, Fields::NNN),
            Opcode::JumpWithOffset => (0xB000, Fields::NNN),
            Opcode::Random => (0xC000, Fields::XKK),
            Opcode::Draw => (0xD000, Fields::XYN),
            Opcode::SkipIfPressed => (0xE09E, Fields::X),
            Opcode::SkipIfNotPressed => (0xE0A1, Fields::X),
            Opcode::ReadDelayTimer => (0xF007, Fields::X),
            Opcode::WaitForKey => (0xF00A, Fields::X),
            Opcode::SetDelayTimer => (0xF015, Fields::X),
            Opcode::SetSoundTimer => (0xF018, Fields::X),
            Opcode::AddIndexReg => (0xF01E, Fields::X),
            Opcode::FontChar => (0xF029, Fields::X),
            Opcode::BCD => (0xF033, Fields::X),
            Opcode::StoreRegs => (0xF055, Fields::X),
            Opcode::LoadRegs => (0xF065, Fields::X),
        }
    }

    /// The literal bits of the opcode, with every operand nibble zeroed.
    pub const fn bits(self) -> u16 {
        self.signature().0
    }

    pub const fn fields(self) -> Fields {
        self.signature().1
    }

    pub const fn mask(self) -> u16 {
        self.fields().mask()
    }

    /// Assembly-style name, e.g. `LD_Vx_byte`.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::ClearDisplay => "CLS",
            Opcode::Return => "RET",
            Opcode::Jump => "JP",
            Opcode::Call => "CALL",
            Opcode::SkipRegEqualImm => "SE_Vx_byte",
            Opcode::SkipRegNotEqualImm => "SNE_Vx_byte",
            Opcode::SkipRegEqualReg => "SE_Vx_Vy",
            Opcode::SetRegImm => "LD_Vx_byte",
            Opcode::AddRegImm => "ADD_Vx_byte",
            Opcode::SetRegReg => "LD_Vx_Vy",
            Opcode::Or => "OR",
            Opcode::And => "AND",
            Opcode::Xor => "XOR",
            Opcode::AddRegReg => "ADD_Vx_Vy",
            Opcode::Sub => "SUB",
            Opcode::ShiftRight => "SHR",
            Opcode::SubReverse => "SUBN",
            Opcode::ShiftLeft => "SHL",
            Opcode::SkipRegNotEqualReg => "SNE_Vx_Vy",
            Opcode::SetIndexImm => "LD_I_addr",
            Opcode::JumpWithOffset => "JP_V0_addr",
            Opcode::Random => "RND",
            Opcode::Draw => "DRW",
            Opcode::SkipIfPressed => "SKP",
            Opcode::SkipIfNotPressed => "SKNP",
            Opcode::ReadDelayTimer => "LD_Vx_DT",
            Opcode::WaitForKey => "LD_Vx_K",
            Opcode::SetDelayTimer => "LD_DT_Vx",
            Opcode::SetSoundTimer => "LD_ST_Vx",
            Opcode::AddIndexReg => "ADD_I_Vx",
            Opcode::FontChar => "LD_F_Vx",
            Opcode::BCD => "LD_B_Vx",
            Opcode::StoreRegs => "LD_I_Vx",
            Opcode::LoadRegs => "LD_Vx_I",
        }
    }

    /// Operand pattern of the opcode, e.g. `8xy4` or `Annn`.
    pub fn pattern(self) -> String {
        let mut chars: Vec<char> = format!("{:04X}", self.bits()).chars().collect();
        let fields = self.fields();

        if fields.nnn {
            chars[1..4].copy_from_slice(&['n', 'n', 'n']);
        }
        if fields.n {
            chars[3] = 'n';
        }
        if fields.x {
            chars[1] = 'x';
        }
        if fields.y {
            chars[2] = 'y';
        }
        if fields.kk {
            chars[2..4].copy_from_slice(&['k', 'k']);
        }

        chars.into_iter().collect()
    }
}

#[derive(Clone, Copy)]
struct DecodeEntry {
    mask: u16,
    bits: u16,
    opcode: Opcode,
}

const DECODE_TABLE: [DecodeEntry; Opcode::ALL.len()] = build_decode_table();

const fn build_decode_table() -> [DecodeEntry; Opcode::ALL.len()] {
    let mut table = [DecodeEntry {
        mask: 0,
        bits: 0,
        opcode: Opcode::ClearDisplay,
    }; Opcode::ALL.len()];

    let mut idx = 0;
    while idx < table.len() {
        let opcode = Opcode::ALL[idx];
        table[idx] = DecodeEntry {
            mask: opcode.mask(),
            bits: opcode.bits(),
            opcode,
        };
        idx += 1;
    }

    table
}

/// A decoded instruction word.
///
/// Operand fields are extracted positionally from the raw word; only the ones
/// listed in the opcode's [`Fields`] are meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    opcode: Opcode,
    raw: u16,
}

impl Instruction {
    /// Decode a 16-bit word, returning `None` when no opcode matches.
    pub fn decode(raw: u16) -> Option<Self> {
        DECODE_TABLE
            .iter()
            .find(|entry| raw & entry.mask == entry.bits)
            .map(|entry| Self {
                opcode: entry.opcode,
                raw,
            })
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn raw(&self) -> u16 {
        self.raw
    }

    pub fn nnn(&self) -> u12 {
        u12::from_low_bits(self.raw)
    }

    pub fn n(&self) -> u4 {
        u4::from_low_bits(self.raw)
    }

    pub fn x(&self) -> u4 {
        u4::from_low_bits(self.raw >> 8)
    }

    pub fn y(&self) -> u4 {
        u4::from_low_bits(self.raw >> 4)
    }

    pub fn kk(&self) -> u8 {
        (self.raw & 0x00FF) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_word_matches_two_opcodes() {
        for word in 0..=u16::MAX {
            let matches = Opcode::ALL
                .iter()
                .filter(|op| word & op.mask() == op.bits())
                .count();
            assert!(matches <= 1, "{word:#06X} matches {matches} opcodes");
        }
    }

    #[test]
    fn every_opcode_decodes_from_its_own_bits() {
        for opcode in Opcode::ALL {
            let decoded = Instruction::decode(opcode.bits()).map(|ins| ins.opcode());
            assert_eq!(decoded, Some(opcode));
        }
    }

    #[test]
    fn unmatched_words_decode_to_none() {
        for word in [0x0000, 0x00E1, 0x0123, 0x5121, 0x8008, 0x800F, 0x9AB1, 0xE19F, 0xF0FF] {
            assert_eq!(Instruction::decode(word), None, "{word:#06X}");
        }
    }

    #[test]
    fn fields_are_extracted_positionally() {
        let ins = Instruction::decode(0xD12A).unwrap();
        assert_eq!(ins.opcode(), Opcode::Draw);
        assert_eq!(ins.x(), u4::new(0x1));
        assert_eq!(ins.y(), u4::new(0x2));
        assert_eq!(ins.n(), u4::new(0xA));
        assert_eq!(ins.kk(), 0x2A);
        assert_eq!(ins.nnn().get(), 0x12A);

        let ins = Instruction::decode(0x2ABC).unwrap();
        assert_eq!(ins.opcode(), Opcode::Call);
        assert_eq!(ins.nnn().get(), 0xABC);
    }

    #[test]
    fn alu_and_f_group_shapes() {
        let cases = [
            (0x8AB0, Opcode::SetRegReg),
            (0x8AB6, Opcode::ShiftRight),
            (0x8ABE, Opcode::ShiftLeft),
            (0xE59E, Opcode::SkipIfPressed),
            (0xE5A1, Opcode::SkipIfNotPressed),
            (0xF30A, Opcode::WaitForKey),
            (0xFF65, Opcode::LoadRegs),
        ];
        for (word, opcode) in cases {
            assert_eq!(Instruction::decode(word).map(|i| i.opcode()), Some(opcode));
        }
    }

    #[test]
    fn masks_follow_field_usage() {
        assert_eq!(Opcode::ClearDisplay.mask(), 0xFFFF);
        assert_eq!(Opcode::Jump.mask(), 0xF000);
        assert_eq!(Opcode::SetRegImm.mask(), 0xF000);
        assert_eq!(Opcode::SetRegReg.mask(), 0xF00F);
        assert_eq!(Opcode::Draw.mask(), 0xF000);
        assert_eq!(Opcode::SkipIfPressed.mask(), 0xF0FF);
    }

    #[test]
    fn patterns() {
        assert_eq!(Opcode::ClearDisplay.pattern(), "00E0");
        assert_eq!(Opcode::Jump.pattern(), "1nnn");
        assert_eq!(Opcode::SkipRegEqualImm.pattern(), "3xkk");
        assert_eq!(Opcode::AddRegReg.pattern(), "8xy4");
        assert_eq!(Opcode::ShiftLeft.pattern(), "8xyE");
        assert_eq!(Opcode::Draw.pattern(), "Dxyn");
        assert_eq!(Opcode::WaitForKey.pattern(), "Fx0A");
    }
}
