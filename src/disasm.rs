//! Static disassembly of a ROM image, one line per 2-byte word.

use crate::emu::{Instruction, ROM_START_ADDRESS};

pub const DEFAULT_ORIGIN: u16 = ROM_START_ADDRESS as u16;

/// Disassembles `rom` as if loaded at `origin`. A trailing odd byte is ignored.
pub fn disassemble(rom: &[u8], origin: u16) -> Vec<String> {
    rom.chunks_exact(2)
        .enumerate()
        .map(|(idx, pair)| {
            let addr = origin.wrapping_add((idx * 2) as u16);
            line(addr, u16::from_be_bytes([pair[0], pair[1]]))
        })
        .collect()
}

/// Formats a single word: address, raw word, then either the decoded
/// instruction with its operands or `DATA`.
pub fn line(addr: u16, word: u16) -> String {
    let mut out = format!("0x{addr:04x}\t{word:04X}\t");

    let Some(ins) = Instruction::decode(word) else {
        out.push_str("DATA");
        return out;
    };

    let opcode = ins.opcode();
    let fields = opcode.fields();
    out.push_str(&format!("{:<11}\t({})\t", opcode.mnemonic(), opcode.pattern()));

    // Unused fields are padded with tabs so the columns line up
    let columns = [
        (fields.nnn, format!("nnn: 0x{:03x}\t", ins.nnn()), "\t\t\t"),
        (fields.n, format!("n: 0x{:x}\t", ins.n()), "\t\t"),
        (fields.x, format!("x: 0x{:x}\t", ins.x()), "\t\t"),
        (fields.y, format!("y: 0x{:x}\t", ins.y()), "\t\t"),
        (fields.kk, format!("kk: 0x{:02x}", ins.kk()), "\t\t"),
    ];
    for (used, text, padding) in columns {
        out.push_str(if used { &text } else { padding });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_words() {
        assert_eq!(line(0x200, 0xFFFF), "0x0200\tFFFF\tDATA");
        assert_eq!(line(0x20e, 0x0000), "0x020e\t0000\tDATA");
    }

    #[test]
    fn instruction_without_operands() {
        assert_eq!(
            line(0x200, 0x00E0),
            "0x0200\t00E0\tCLS        \t(00E0)\t\t\t\t\t\t\t\t\t\t\t\t"
        );
    }

    #[test]
    fn address_operand() {
        assert_eq!(
            line(0x200, 0x1234),
            "0x0200\t1234\tJP         \t(1nnn)\tnnn: 0x234\t\t\t\t\t\t\t\t\t"
        );
    }

    #[test]
    fn register_and_nibble_operands() {
        assert_eq!(
            line(0x202, 0xD12A),
            "0x0202\tD12A\tDRW        \t(Dxyn)\t\t\t\tn: 0xa\tx: 0x1\ty: 0x2\t\t\t"
        );
        assert_eq!(
            line(0x204, 0x6A0B),
            "0x0204\t6A0B\tLD_Vx_byte \t(6xkk)\t\t\t\t\t\tx: 0xa\t\t\tkk: 0x0b"
        );
    }

    #[test]
    fn whole_rom_from_origin() {
        let lines = disassemble(&[0x00, 0xE0, 0xFF, 0xFF, 0x12], DEFAULT_ORIGIN);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0x0200\t00E0\tCLS"));
        assert_eq!(lines[1], "0x0202\tFFFF\tDATA");

        let lines = disassemble(&[0x00, 0xE0], 0x600);
        assert!(lines[0].starts_with("0x0600\t"));
    }
}
