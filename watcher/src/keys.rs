use std::io::{ErrorKind, Read};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const QUIT: KeyCode = KeyCode('q');

/// Exit status after a second Ctrl-C, as a shell reports SIGINT.
const INTERRUPTED: i32 = 130;

/// A single key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCode(pub char);

impl KeyCode {
    pub fn is_quit(self) -> bool {
        self.0.eq_ignore_ascii_case(&QUIT.0)
    }
}

/// Non-blocking source of key presses, polled once per loop iteration.
pub trait KeySource {
    /// Returns immediately; `None` when nothing is pending.
    fn poll_key(&mut self) -> Option<KeyCode>;
}

/// Keys typed on stdin, plus Ctrl-C reported as `q`.
///
/// stdin is read on a detached OS thread, never on the runtime's blocking
/// pool: a pending read there would keep the runtime from shutting down
/// once the loop has stopped. A second Ctrl-C exits the process directly,
/// for when the loop is stuck waiting on its source.
pub struct TerminalKeys {
    rx: mpsc::UnboundedReceiver<KeyCode>,
}

impl TerminalKeys {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let stdin_tx = tx.clone();
        let reader = std::thread::Builder::new()
            .name("key-reader".into())
            .spawn(move || forward_keys(std::io::stdin().lock(), &stdin_tx));
        if let Err(e) = reader {
            warn!(error = %e, "failed to start key reader, only Ctrl-C will stop the loop");
        }

        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                return;
            }
            debug!("Ctrl-C received");
            let _ = tx.send(QUIT);

            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("second Ctrl-C, exiting without cleanup");
                std::process::exit(INTERRUPTED);
            }
        });

        Self { rx }
    }
}

impl KeySource for TerminalKeys {
    fn poll_key(&mut self) -> Option<KeyCode> {
        self.rx.try_recv().ok()
    }
}

/// Blocking loop: forward printable bytes from `input` until it closes,
/// fails, or nobody is listening any more.
fn forward_keys<R: Read>(mut input: R, tx: &mpsc::UnboundedSender<KeyCode>) {
    let mut buf = [0u8; 64];
    loop {
        match input.read(&mut buf) {
            Ok(0) => {
                debug!("stdin closed, no more key input");
                return;
            }
            Ok(n) => {
                for &b in &buf[..n] {
                    if b.is_ascii_graphic() && tx.send(KeyCode(b as char)).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                return;
            }
        }
    }
}
