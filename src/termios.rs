/**
 * Raw, non-blocking serial ports through the termios interface.
 */
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::mem;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use crate::transport::Transport;


pub trait Termio {
    fn configure_raw(&self, speed: BaudRate) -> io::Result<()>;
    fn drop_input_output(&self) -> io::Result<()>;
    fn input_buffer_count(&self) -> io::Result<usize>;
    fn set_blocking(&self, blocking: bool) -> io::Result<()>;
}
impl<T> Termio for T where T: AsRawFd {
    fn configure_raw(&self, speed: BaudRate) -> io::Result<()> {
        let fd = self.as_raw_fd();
        let mut config: libc::termios = unsafe { mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut config) } < 0 {
            return Err(io::Error::last_os_error());
        }
        unsafe { libc::cfmakeraw(&mut config) };
        if unsafe { libc::cfsetspeed(&mut config, speed.speed()) } < 0 {
            return Err(io::Error::last_os_error());
        }
        config.c_cflag |= libc::CLOCAL | libc::CREAD;
        // Reads return immediately with whatever is buffered
        config.c_cc[libc::VMIN] = 0;
        config.c_cc[libc::VTIME] = 0;
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &config) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn drop_input_output(&self) -> io::Result<()> {
        let fd = self.as_raw_fd();
        if unsafe { libc::tcflush(fd, libc::TCIOFLUSH) } < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    fn input_buffer_count(&self) -> io::Result<usize> {
        let fd = self.as_raw_fd();
        let mut size: libc::c_int = 0;
        if unsafe { libc::ioctl(fd, libc::FIONREAD, &mut size as *mut libc::c_int) } < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(size.max(0) as usize)
        }
    }

    fn set_blocking(&self, blocking: bool) -> io::Result<()> {
        let fd = self.as_raw_fd();
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        let flags = if blocking {
            flags & !libc::O_NONBLOCK
        } else {
            flags | libc::O_NONBLOCK
        };
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}


enum_from_primitive! {
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BaudRate {
    B1200 = 1200,
    B2400 = 2400,
    B4800 = 4800,
    B9600 = 9600,
    B19200 = 19200,
    B38400 = 38400,
    B57600 = 57600,
    B115200 = 115200,
    B230400 = 230400,
    B460800 = 460800,
    B921600 = 921600,
    B1152000 = 1152000,
}
}

impl BaudRate {
    pub fn speed(self) -> libc::speed_t {
        match self {
            BaudRate::B1200 => libc::B1200,
            BaudRate::B2400 => libc::B2400,
            BaudRate::B4800 => libc::B4800,
            BaudRate::B9600 => libc::B9600,
            BaudRate::B19200 => libc::B19200,
            BaudRate::B38400 => libc::B38400,
            BaudRate::B57600 => libc::B57600,
            BaudRate::B115200 => libc::B115200,
            BaudRate::B230400 => libc::B230400,
            BaudRate::B460800 => libc::B460800,
            BaudRate::B921600 => libc::B921600,
            BaudRate::B1152000 => libc::B1152000,
        }
    }
}


/**
 * A raw serial device. Opened non-blocking so a missing carrier can't hang the open, then
 * switched to blocking so a record is never half written. Reads still return immediately
 * because they only ask for bytes already waiting and VMIN and VTIME are 0.
 */
pub struct Tty {
    file: File,
}

impl Tty {
    pub fn open(path: &str, speed: BaudRate) -> io::Result<Tty> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)?;
        file.configure_raw(speed)?;
        file.drop_input_output()?;
        file.set_blocking(true)?;
        info!("Opened {} at {} baud", path, speed as u32);
        Ok(Tty { file: file })
    }
}

impl Transport for Tty {
    fn read_available(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let waiting = self.file.input_buffer_count()?;
        if waiting == 0 {
            return Ok(0);
        }
        let length = waiting.min(buffer.len());
        match self.file.read(&mut buffer[..length]) {
            Ok(count) => Ok(count),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }
}


#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;

    use enum_primitive::FromPrimitive;

    use super::{BaudRate, Termio, Tty};

    #[test]
    fn test_baud_rate_from_number() {
        assert_eq!(BaudRate::from_u32(9600), Some(BaudRate::B9600));
        assert_eq!(BaudRate::from_u32(115200), Some(BaudRate::B115200));
        assert_eq!(BaudRate::from_u32(9601), None);
        assert_eq!(BaudRate::B9600.speed(), libc::B9600);
        assert_eq!(BaudRate::B57600 as u32, 57600);
    }

    #[test]
    fn test_open_missing_device() {
        assert!(Tty::open("/dev/does-not-exist-asv", BaudRate::B9600).is_err());
    }

    #[test]
    fn test_regular_file_is_not_a_tty() {
        // /dev/null opens fine but has no termios attributes
        assert!(Tty::open("/dev/null", BaudRate::B9600).is_err());
    }

    #[test]
    fn test_set_blocking_clears_nonblock() {
        let file = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open("/dev/null")
            .unwrap();
        let flags = || unsafe { libc::fcntl(file.as_raw_fd(), libc::F_GETFL) };
        assert!(flags() & libc::O_NONBLOCK != 0);
        file.set_blocking(true).unwrap();
        assert_eq!(flags() & libc::O_NONBLOCK, 0);
        file.set_blocking(false).unwrap();
        assert!(flags() & libc::O_NONBLOCK != 0);
    }
}
