use crate::timing::TimingConfig;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{self, Read};
use std::net::TcpStream;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// frames of samples that can queue up before the feeder blocks
const BACKLOG_FRAMES: f64 = 4.0;
const READ_SIZE: usize = 4096;

/// channel for raw samples between a feeder and a `ChannelSignal`
pub fn sample_channel(timing: &TimingConfig) -> (Sender<u8>, Receiver<u8>) {
    let capacity = (BACKLOG_FRAMES * timing.frame_time / timing.dot_time).round() as usize;
    bounded(capacity.max(1))
}

/// Connect to `addr` and forward every byte read, one sample each, until the
/// peer closes or nobody is listening on the channel any more.
pub fn spawn_tcp_feeder(addr: String, sender: Sender<u8>) -> JoinHandle<Result<(), io::Error>> {
    thread::spawn(move || {
        let mut stream = TcpStream::connect(&addr)?;
        stream.set_nodelay(true)?;
        info!(%addr, "receiving samples");
        let mut buf = [0u8; READ_SIZE];
        let mut total: u64 = 0;
        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) => {
                    info!(%addr, total, "sample source closed");
                    return Ok(());
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            for &b in &buf[..n] {
                if sender.send(b).is_err() {
                    debug!(total, "sample receiver gone");
                    return Ok(());
                }
            }
            total += n as u64;
        }
    })
}
