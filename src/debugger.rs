use std::fmt;

use colored::{ColoredString, Colorize};

use crate::devices::RegisterFile;
use crate::regs::{DATA_BASE, Status};

/// Renders a register file for humans. Rendering goes through the
/// side-effect-free views, so it never bumps the read counter.
#[derive(Debug)]
pub struct Debugger {
    columns: usize,
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

impl Debugger {
    pub fn new() -> Self {
        Self { columns: 16 }
    }

    pub fn print_register_dump(&self, regs: &RegisterFile) {
        print!("{}", self.dump(regs));
    }

    /// Lazily formatted dump of `regs`.
    pub fn dump<'a>(&'a self, regs: &'a RegisterFile) -> RegisterDump<'a> {
        RegisterDump {
            debugger: self,
            regs,
        }
    }

    pub fn render(&self, regs: &RegisterFile) -> String {
        self.dump(regs).to_string()
    }

    fn render_into(&self, out: &mut fmt::Formatter<'_>, regs: &RegisterFile) -> fmt::Result {
        writeln!(
            out,
            "{}",
            "================= Register dump =================="
                .bright_cyan()
                .bold()
        )?;

        let ctrl = regs.control();
        writeln!(
            out,
            "{} {:#04x}  read:{} write:{}",
            "Control:".bright_magenta().bold(),
            ctrl.raw(),
            format_bit(ctrl.read_data()),
            format_bit(ctrl.write_data()),
        )?;

        self.render_status(out, &regs.status())?;

        writeln!(
            out,
            "{}",
            "--------------------------------------------------".bright_cyan()
        )?;
        writeln!(out, "{}", "Data:".bright_magenta().bold())?;
        self.render_data_grid(out, regs.data())
    }

    fn render_status(&self, out: &mut fmt::Formatter<'_>, status: &Status) -> fmt::Result {
        let overflow = if status.overflow() {
            "overflow".bright_red().bold()
        } else {
            "no overflow".bright_black()
        };
        writeln!(
            out,
            "{} {:#04x}  read:{} write:{} {overflow}",
            "Status: ".bright_magenta().bold(),
            status.flags.raw(),
            format_bit(status.read_enabled()),
            format_bit(status.write_enabled()),
        )?;
        writeln!(
            out,
            "         reads:{} writes:{}",
            format!("{:#06x}", status.read_count).bright_yellow(),
            format!("{:#06x}", status.write_count).bright_yellow(),
        )
    }

    fn render_data_grid(&self, out: &mut fmt::Formatter<'_>, data: &[u8]) -> fmt::Result {
        let columns = self.columns;
        for (row, chunk) in data.chunks(columns).enumerate() {
            let offset = DATA_BASE + row * columns;
            write!(out, "  {}:", format!("{offset:#05x}").bright_blue())?;
            for &byte in chunk {
                write!(out, " {}", format_data_byte(byte))?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

pub struct RegisterDump<'a> {
    debugger: &'a Debugger,
    regs: &'a RegisterFile,
}

impl fmt::Display for RegisterDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.debugger.render_into(f, self.regs)
    }
}

fn format_bit(set: bool) -> ColoredString {
    if set {
        "1".bright_green()
    } else {
        "0".bright_red()
    }
}

fn format_data_byte(byte: u8) -> ColoredString {
    match byte {
        0 => "00".bright_black(),
        b if b.is_ascii_graphic() => format!("{b:02x}").bright_green(),
        b => format!("{b:02x}").white(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_shows_registers() {
        let mut regs = RegisterFile::new();
        regs.write(0, b"Hi").unwrap();
        regs.set_read_enabled(false);

        let dump = Debugger::new().render(&regs);
        assert!(dump.contains("0x02"));
        assert!(dump.contains("0x0001"));
        assert!(dump.contains("48"));
        assert!(dump.contains("0x006"));
        assert_eq!(dump.lines().count(), 6 + 16);
    }

    #[test]
    fn test_dump_formats_like_render() {
        let mut regs = RegisterFile::new();
        regs.write(16, &[0xAB; 4]).unwrap();

        let debugger = Debugger::new();
        let dump = debugger.dump(&regs);
        assert_eq!(format!("{dump}"), debugger.render(&regs));
        assert!(format!("{dump}").contains("ab"));
    }

    #[test]
    fn test_render_has_no_side_effects() {
        let regs = RegisterFile::new();
        let before = regs.status();
        let _ = Debugger::new().render(&regs);
        assert_eq!(regs.status(), before);
    }
}
