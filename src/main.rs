use anyhow::{Context, bail};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use vchar_dev::debugger::Debugger;
use vchar_dev::{
    CharDriver, DeviceHandle, IoctlReply, IoctlRequest, MmioError, MmioManager, Status,
    VcharError,
};

const DEVICE_NODE: &str = "/dev/char_device_file";
const BUFFER_SIZE: usize = 1024;
const MMIO_BASE: u64 = 0x0900_0000; // Base address of the register window

struct Menu {
    driver: CharDriver,
    mmio: MmioManager,
    debugger: Debugger,
    handle: Option<DeviceHandle>,
}

fn prompt(input: &mut impl BufRead, message: &str) -> Result<Option<String>, VcharError> {
    print!("{message}");
    io::stdout().flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn parse_number(text: &str) -> anyhow::Result<u64> {
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.with_context(|| format!("'{text}' is not a number"))
}

/// Parses `offset size [value]` for the MMIO commands.
fn parse_mmio_args(line: &str, with_value: bool) -> anyhow::Result<(u64, usize, u64)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let expected = if with_value { 3 } else { 2 };
    if fields.len() != expected {
        bail!("expected {expected} fields, got {}", fields.len());
    }

    let offset = parse_number(fields[0])?;
    let size = parse_number(fields[1])? as usize;
    let value = if with_value {
        parse_number(fields[2])?
    } else {
        0
    };
    Ok((offset, size, value))
}

fn print_permissions(status: &Status) {
    let word = |enabled: bool| if enabled { "Enable" } else { "Disable" };
    println!(
        "Current status:\n\tWriting: {} - Reading: {}",
        word(status.write_enabled()),
        word(status.read_enabled())
    );
}

impl Menu {
    fn new() -> Result<Self, VcharError> {
        let driver = CharDriver::attach();
        let mut mmio = MmioManager::default();
        mmio.register_device(MMIO_BASE, Box::new(driver.mmio_window()))?;

        Ok(Self {
            driver,
            mmio,
            debugger: Debugger::new(),
            handle: None,
        })
    }

    fn print_options() {
        println!("Select below options:");
        println!("\to (to open a device node)");
        println!("\tc (to close the device node)");
        println!("\tr (to read data from the device node)");
        println!("\tw (to write data to the device node)");
        println!("\tC (to clear data registers)");
        println!("\tR (to enable/disable to read from data registers)");
        println!("\tW (to enable/disable to write to data registers)");
        println!("\ts (to get status of device)");
        println!("\td (to dump all registers)");
        println!("\tm (to read a register through MMIO)");
        println!("\tM (to write a register through MMIO)");
        println!("\tq (to quit the application)");
    }

    fn read_data(&mut self) {
        let mut handle = self.driver.open();
        let mut buf = [0u8; BUFFER_SIZE];

        match handle.read(&mut buf) {
            Ok(n) => {
                let message = buf[..n].split(|&b| b == 0).next().unwrap_or_default();
                println!(
                    "Read a message from {DEVICE_NODE}: {}",
                    String::from_utf8_lossy(message)
                );
            }
            Err(e) => println!(
                "{}",
                format!("Could not read a message from {DEVICE_NODE}: {e}").bright_red()
            ),
        }
    }

    fn write_data(&mut self, input: &mut impl BufRead) -> Result<(), VcharError> {
        let Some(message) = prompt(input, "Enter your message: ")? else {
            return Ok(());
        };
        let mut bytes = message.into_bytes();
        bytes.push(0);

        let mut handle = self.driver.open();
        match handle.write(&bytes) {
            Ok(n) if n < bytes.len() => println!(
                "{}",
                format!("Wrote {n} of {} bytes to {DEVICE_NODE}", bytes.len()).bright_yellow()
            ),
            Ok(_) => println!("Wrote the message to {DEVICE_NODE}"),
            Err(e) => println!(
                "{}",
                format!("Could not write the message to {DEVICE_NODE}: {e}").bright_red()
            ),
        }
        Ok(())
    }

    fn clear_data(&mut self) {
        let mut handle = self.driver.open();
        match handle.ioctl(IoctlRequest::ClearDataRegs) {
            Ok(_) => println!("Clear data registers in char device"),
            Err(e) => println!(
                "{}",
                format!("Could not clear data registers in char device: {e}").bright_red()
            ),
        }
    }

    fn status(handle: &mut DeviceHandle) -> Result<Status, VcharError> {
        match handle.ioctl(IoctlRequest::GetStatus)? {
            IoctlReply::Status(status) => Ok(status),
            IoctlReply::Done => Err(anyhow::anyhow!("status request returned no status").into()),
        }
    }

    fn control(&mut self, input: &mut impl BufRead, write: bool) -> Result<(), VcharError> {
        let what = if write {
            "writing to"
        } else {
            "reading from"
        };
        let question = format!("Do you want to enable {what} data registers (y/n)? ");
        let enable = match prompt(input, &question)?.as_deref() {
            Some("y") => true,
            Some("n") => false,
            _ => return Ok(()),
        };

        let mut handle = self.driver.open();
        let request = if write {
            IoctlRequest::SetWriteEnabled(enable)
        } else {
            IoctlRequest::SetReadEnabled(enable)
        };
        handle.ioctl(request)?;

        let status = Self::status(&mut handle)?;
        let enabled = if write {
            status.write_enabled()
        } else {
            status.read_enabled()
        };
        let verb = if write { "write to" } else { "read from" };
        if enabled {
            println!("Enable to {verb} data registers successful");
        } else {
            println!("Disable to {verb} data registers successful");
        }
        Ok(())
    }

    fn get_status(&mut self) -> Result<(), VcharError> {
        let mut handle = self.driver.open();
        let status = Self::status(&mut handle)?;

        print_permissions(&status);
        if status.overflow() {
            println!("\t{}", "Data registers overflowed".bright_red());
        }
        println!(
            "Statistic: number of reading({}), number of writing ({})",
            status.read_count, status.write_count
        );
        Ok(())
    }

    fn mmio_access(&mut self, input: &mut impl BufRead, write: bool) -> Result<(), VcharError> {
        let message = if write {
            "Enter offset, size and value: "
        } else {
            "Enter offset and size: "
        };
        let Some(line) = prompt(input, message)? else {
            return Ok(());
        };

        let (offset, size, value) = match parse_mmio_args(&line, write) {
            Ok(args) => args,
            Err(e) => {
                println!("{}", format!("Invalid input: {e:#}").bright_red());
                return Ok(());
            }
        };

        let Some(addr) = MMIO_BASE.checked_add(offset) else {
            let err = MmioError::UnmappedAccess(offset);
            println!("{}", format!("Invalid input: {err}").bright_red());
            return Ok(());
        };
        let result = if write {
            self.mmio.handle_write(addr, size, value).map(|()| value)
        } else {
            self.mmio.handle_read(addr, size)
        };
        match result {
            Ok(v) => println!("[{addr:#x}] = {v:#x}"),
            Err(e) => println!("{}", e.to_string().bright_red()),
        }
        Ok(())
    }

    fn run(&mut self, input: &mut impl BufRead) -> Result<(), VcharError> {
        Self::print_options();

        loop {
            let Some(option) = prompt(input, "Enter your option: ")? else {
                break;
            };

            match option.as_str() {
                "o" => {
                    if self.handle.is_none() {
                        self.handle = Some(self.driver.open());
                    } else {
                        println!("{DEVICE_NODE} has already opened");
                    }
                }
                "c" => {
                    if self.handle.take().is_none() {
                        println!("{DEVICE_NODE} has not opened yet! Can not close");
                    }
                }
                "r" => self.read_data(),
                "w" => self.write_data(input)?,
                "C" => self.clear_data(),
                "R" => self.control(input, false)?,
                "W" => self.control(input, true)?,
                "s" => self.get_status()?,
                "d" => self
                    .debugger
                    .print_register_dump(&self.driver.registers()),
                "m" => self.mmio_access(input, false)?,
                "M" => self.mmio_access(input, true)?,
                "q" => break,
                other => println!("invalid option {other}"),
            }
        }

        self.handle = None;
        println!("Quit the application. Good bye!");
        Ok(())
    }
}

fn run() -> Result<(), VcharError> {
    env_logger::init();

    let mut menu = Menu::new()?;
    let stdin = io::stdin();
    menu.run(&mut stdin.lock())
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(e) => {
            eprintln!("{e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mmio_args() {
        assert_eq!(parse_mmio_args("0x6 1", false).unwrap(), (6, 1, 0));
        assert_eq!(parse_mmio_args("8 8 0xff", true).unwrap(), (8, 8, 0xFF));
        assert!(parse_mmio_args("6", false).is_err());
        assert!(parse_mmio_args("6 1 zz", true).is_err());
    }

    #[test]
    fn test_scripted_session() {
        let script = "o\nw\nhello\nR\nn\nr\ns\nd\nM\n0 1 3\nm\n0x6 1\nC\nc\nq\n";
        let mut menu = Menu::new().unwrap();
        menu.run(&mut script.as_bytes()).unwrap();

        let regs = menu.driver.registers();
        assert!(regs.status().read_enabled());
        assert!(regs.data().iter().all(|&b| b == 0));
        assert_eq!(regs.status().write_count, 1);
        assert!(menu.handle.is_none());
    }

    #[test]
    fn test_mmio_offset_past_address_space() {
        let script = "m\n0xffffffffffffffff 1\nM\n0xfffffffffffffffa 1 1\nq\n";
        let mut menu = Menu::new().unwrap();
        menu.run(&mut script.as_bytes()).unwrap();

        let regs = menu.driver.registers();
        assert_eq!(regs.status().read_count, 0);
        assert_eq!(regs.control().raw(), 0x03);
    }
}
