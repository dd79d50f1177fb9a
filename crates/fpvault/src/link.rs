use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use serialport::SerialPort;

use crate::exit::{io_error, CliError, CliResult, FAILURE, USAGE};

/// Where to find the device. Exactly one of the two must be given.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial port of the device (e.g. /dev/ttyACM0).
    #[arg(long, env = "FPVAULT_PORT", conflicts_with = "socket")]
    pub port: Option<PathBuf>,

    /// Unix socket of a simulated device (see `fpvault simulate`).
    #[arg(long, env = "FPVAULT_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Serial baud rate.
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,
}

/// One byte link to the device, serial or socket, behind a single
/// `Read + Write` type so the host client does not care which.
pub enum DeviceLink {
    Serial(Box<dyn SerialPort>),
    Socket(UnixStream),
}

impl std::fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceLink::Serial(port) => f.debug_tuple("Serial").field(&port.name()).finish(),
            DeviceLink::Socket(stream) => f.debug_tuple("Socket").field(stream).finish(),
        }
    }
}

impl DeviceLink {
    pub fn open(args: &LinkArgs, read_timeout: Duration) -> CliResult<Self> {
        if let Some(port) = &args.port {
            let port = serialport::new(port.to_string_lossy(), args.baud)
                .timeout(read_timeout)
                .open()
                .map_err(|err| {
                    CliError::new(FAILURE, format!("failed opening serial port: {err}"))
                })?;
            return Ok(DeviceLink::Serial(port));
        }
        if let Some(socket) = &args.socket {
            let stream = UnixStream::connect(socket)
                .map_err(|err| io_error("failed connecting to simulator socket", err))?;
            stream
                .set_read_timeout(Some(read_timeout))
                .map_err(|err| io_error("failed setting read timeout", err))?;
            return Ok(DeviceLink::Socket(stream));
        }
        Err(CliError::new(
            USAGE,
            "no device given: pass --port or --socket (or set FPVAULT_PORT / FPVAULT_SOCKET)",
        ))
    }
}

impl Read for DeviceLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            DeviceLink::Serial(port) => port.read(buf),
            DeviceLink::Socket(stream) => stream.read(buf),
        }
    }
}

impl Write for DeviceLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            DeviceLink::Serial(port) => port.write(buf),
            DeviceLink::Socket(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            DeviceLink::Serial(port) => port.flush(),
            DeviceLink::Socket(stream) => stream.flush(),
        }
    }
}
