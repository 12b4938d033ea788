use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    cortex_intent::LightState,
    tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex},
    tracing::{debug, info, warn},
};

use crate::{
    Actuator,
    error::{Error, Result},
};

/// Device node name fragments used by common USB serial adapters.
const DEVICE_HINTS: &[&str] = &["tty.usbserial", "ttyUSB", "ttyACM"];

const SWITCH_ON: u8 = b'u';
const SWITCH_OFF: u8 = b'd';

/// Encode one controller command: a command byte followed by the light
/// number as a little-endian `u32`.
pub fn encode_command(target_id: u32, state: LightState) -> [u8; 5] {
    let command = if state.is_on() {
        SWITCH_ON
    } else {
        SWITCH_OFF
    };
    let arg = target_id.to_le_bytes();
    [command, arg[0], arg[1], arg[2], arg[3]]
}

/// Find the first entry in `dir` that looks like a USB serial adapter.
pub fn discover_in(dir: &Path) -> Option<PathBuf> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| DEVICE_HINTS.iter().any(|hint| name.contains(hint)))
        .collect();
    names.sort();
    names.into_iter().next().map(|name| dir.join(name))
}

/// Writes switch commands to a serial device node.
///
/// The controller talks 9600 baud 8N1. The line is not configured here; set
/// it up once before starting, e.g.
/// `stty -F /dev/ttyACM0 9600 cs8 -cstopb -parenb raw`. The node is opened
/// lazily and reopened after a failed write.
pub struct SerialActuator {
    device: Option<PathBuf>,
    port: Mutex<Option<tokio::fs::File>>,
}

impl SerialActuator {
    pub fn new(device: Option<PathBuf>) -> Self {
        Self {
            device,
            port: Mutex::new(None),
        }
    }

    /// Use the configured device, or look for one under `/dev`.
    pub fn from_config(device: Option<&Path>) -> Self {
        let device = device
            .map(Path::to_path_buf)
            .or_else(|| discover_in(Path::new("/dev")));
        match &device {
            Some(path) => info!(device = %path.display(), "light controller device"),
            None => warn!("no light controller found, lighting commands will fail"),
        }
        Self::new(device)
    }
}

#[async_trait]
impl Actuator for SerialActuator {
    async fn apply(&self, target_id: u32, state: LightState) -> Result<()> {
        let path = self.device.as_ref().ok_or(Error::NoDevice)?;
        let io_err = |source| Error::Io {
            path: path.clone(),
            source,
        };
        let frame = encode_command(target_id, state);

        let mut port = self.port.lock().await;
        if port.is_none() {
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .await
                .map_err(io_err)?;
            *port = Some(file);
        }
        let Some(file) = port.as_mut() else {
            return Err(Error::NoDevice);
        };

        let written = match file.write_all(&frame).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            *port = None;
            return Err(io_err(e));
        }
        debug!(target_id, state = %state, "light command sent");
        Ok(())
    }
}
