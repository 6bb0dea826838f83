use super::{Chip8Error, Cpu, Instruction, Opcode};
use crate::u4;

impl Cpu {
    pub(crate) fn execute(&mut self, instruction: Instruction) -> Result<(), Chip8Error> {
        let x = instruction.x();
        let y = instruction.y();
        let kk = instruction.kk();
        let nnn = u16::from(instruction.nnn());

        match instruction.opcode() {
            Opcode::ClearDisplay => {
                self.framebuffer.clear();
            }
            Opcode::Return => {
                self.pc = *self.stack_top()?;
                self.sp = self.sp.wrapping_sub(1);
            }
            Opcode::Jump => {
                self.pc = nnn.wrapping_sub(2);
            }
            Opcode::Call => {
                self.sp = self.sp.wrapping_add(1);
                *self.stack_top()? = self.pc;
                self.pc = nnn.wrapping_sub(2);
            }
            Opcode::SkipRegEqualImm => {
                self.skip_if(self.v[x] == kk);
            }
            Opcode::SkipRegNotEqualImm => {
                self.skip_if(self.v[x] != kk);
            }
            Opcode::SkipRegEqualReg => {
                self.skip_if(self.v[x] == self.v[y]);
            }
            Opcode::SkipRegNotEqualReg => {
                self.skip_if(self.v[x] != self.v[y]);
            }
            Opcode::SetRegImm => {
                self.v[x] = kk;
            }
            Opcode::AddRegImm => {
                self.v[x] = self.v[x].wrapping_add(kk);
            }
            Opcode::SetRegReg => {
                self.v[x] = self.v[y];
            }
            Opcode::Or => {
                self.v[x] |= self.v[y];
            }
            Opcode::And => {
                self.v[x] &= self.v[y];
            }
            Opcode::Xor => {
                self.v[x] ^= self.v[y];
            }
            Opcode::AddRegReg => {
                let (res, overflow) = self.v[x].overflowing_add(self.v[y]);
                self.v[0xF] = overflow.into();
                self.v[x] = res;
            }
            Opcode::Sub => {
                let (vx, vy) = (self.v[x], self.v[y]);
                self.v[0xF] = (vx >= vy).into();
                self.v[x] = vx.wrapping_sub(vy);
            }
            Opcode::SubReverse => {
                let (vx, vy) = (self.v[x], self.v[y]);
                self.v[0xF] = (vy >= vx).into();
                self.v[x] = vy.wrapping_sub(vx);
            }
            // Shifts operate on Vx in place; Vy is ignored.
            Opcode::ShiftRight => {
                self.v[0xF] = self.v[x] & 1;
                self.v[x] >>= 1;
            }
            Opcode::ShiftLeft => {
                self.v[0xF] = (self.v[x] >> 7) & 1;
                self.v[x] <<= 1;
            }
            Opcode::SetIndexImm => {
                self.i = nnn;
            }
            Opcode::JumpWithOffset => {
                self.pc = nnn.wrapping_add(self.v[0].into()).wrapping_sub(2);
            }
            Opcode::Random => {
                let rand_byte: u8 = rand::random();
                self.v[x] = rand_byte & kk;
            }
            Opcode::Draw => {
                self.execute_draw(x, y, instruction.n());
            }
            Opcode::SkipIfPressed => {
                self.skip_if(self.keypad.is_pressed(self.v[x]));
            }
            Opcode::SkipIfNotPressed => {
                self.skip_if(!self.keypad.is_pressed(self.v[x]));
            }
            Opcode::ReadDelayTimer => {
                self.v[x] = self.timers.delay();
            }
            Opcode::WaitForKey => {
                self.v[x] = self.keypad.wait_for_key()?.into();
            }
            Opcode::SetDelayTimer => {
                self.timers.set_delay(self.v[x]);
            }
            Opcode::SetSoundTimer => {
                self.timers.set_sound(self.v[x]);
            }
            Opcode::AddIndexReg => {
                self.i = self.i.wrapping_add(self.v[x].into());
            }
            Opcode::FontChar => {
                self.i = u16::from(self.v[x]).wrapping_mul(5);
            }
            Opcode::BCD => {
                let value = self.v[x];
                self.memory.write(self.i, value / 100);
                self.memory.write(self.i.wrapping_add(1), (value / 10) % 10);
                self.memory.write(self.i.wrapping_add(2), value % 10);
            }
            // Block load/store leave I unchanged.
            Opcode::StoreRegs => {
                for reg_index in 0..=x.get() {
                    let addr = self.i.wrapping_add(reg_index.into());
                    self.memory.write(addr, self.v[reg_index as usize]);
                }
            }
            Opcode::LoadRegs => {
                for reg_index in 0..=x.get() {
                    let addr = self.i.wrapping_add(reg_index.into());
                    self.v[reg_index as usize] = self.memory.read(addr);
                }
            }
        };

        Ok(())
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) {
        let sprite = self
            .memory
            .read_range(self.i, self.i.wrapping_add(n.get().into()));
        let collision = self
            .framebuffer
            .draw_sprite(self.v[x], self.v[y], &sprite, self.clip_edges);

        self.v[0xF] = collision.into();
    }
}
