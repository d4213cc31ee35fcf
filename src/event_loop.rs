//! Interactive command loop driving a capture session.
//!
//! Input arrives on a channel so stdin reading and the Ctrl+C handler can
//! live on their own threads. Between inputs the loop pumps the session so
//! capture events show up as status lines.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::cli::ConsolePresenter;
use crate::persistence::{ImageWriter, PngWriter};
use crate::session::SessionController;

/// How often the loop wakes to pump capture events when idle.
pub const DEFAULT_POLL: Duration = Duration::from_millis(100);

pub const HELP_TEXT: &str = "Commands:
  start            open the camera and start the preview
  stop             stop the camera and keep the last frame
  process          tile the kept frame into the template
  save             write the composite to the output path
  status           show session state
  snapshot [path]  write the latest preview frame (default: snapshot.png)
  help             show this help
  quit             stop and exit";

/// Something delivered to the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    Interrupt,
}

/// A parsed user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Start,
    Stop,
    Process,
    Save,
    Status,
    Snapshot(PathBuf),
    Help,
    Quit,
}

impl UserCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();

        let command = match word.to_ascii_lowercase().as_str() {
            "start" | "s" => UserCommand::Start,
            "stop" | "x" => UserCommand::Stop,
            "process" | "p" => UserCommand::Process,
            "save" | "w" => UserCommand::Save,
            "status" => UserCommand::Status,
            "snapshot" => {
                UserCommand::Snapshot(PathBuf::from(arg.unwrap_or("snapshot.png")))
            }
            "help" | "?" => UserCommand::Help,
            "quit" | "exit" | "q" => UserCommand::Quit,
            other => return Err(format!("Unknown command '{}' (type 'help')", other)),
        };
        Ok(Some(command))
    }
}

/// Run until `quit`, an interrupt, or the input channel closes.
///
/// Command errors are reported by the session itself, so they only get
/// logged here. Capture is stopped before returning.
pub fn run(
    session: &mut SessionController,
    console: &ConsolePresenter,
    input: Receiver<Input>,
    poll: Duration,
) {
    println!("{}", HELP_TEXT);

    loop {
        let line = match input.recv_timeout(poll) {
            Ok(Input::Line(line)) => line,
            Ok(Input::Interrupt) => {
                log::info!("Interrupted");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                session.pump();
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("Input closed");
                break;
            }
        };

        session.pump();
        let command = match UserCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };

        if !dispatch(session, console, command) {
            break;
        }
    }

    session.pump();
    if session.is_capturing() {
        session.stop_camera();
    }
}

/// Execute one command. Returns false when the loop should end.
fn dispatch(session: &mut SessionController, console: &ConsolePresenter, command: UserCommand) -> bool {
    let result = match command {
        UserCommand::Start => session.start_camera(),
        UserCommand::Stop => {
            session.stop_camera();
            Ok(())
        }
        UserCommand::Process => session.run_processing(),
        UserCommand::Save => session.save_result(),
        UserCommand::Status => {
            print_status(session, console);
            Ok(())
        }
        UserCommand::Snapshot(path) => {
            write_snapshot(console, &path);
            Ok(())
        }
        UserCommand::Help => {
            println!("{}", HELP_TEXT);
            Ok(())
        }
        UserCommand::Quit => return false,
    };

    if let Err(e) = result {
        log::debug!("Command failed: {}", e);
    }
    true
}

fn print_status(session: &SessionController, console: &ConsolePresenter) {
    let dims = |frame: Option<&crate::camera::Frame>| match frame {
        Some(f) => format!("{}x{}", f.width(), f.height()),
        None => "none".to_string(),
    };
    println!("state:     {}", session.state());
    println!("template:  {}", dims(session.template()));
    println!("captured:  {}", dims(session.captured_frame()));
    println!("composite: {}", dims(session.composite()));
    println!("previews:  {}", console.preview_count());
    println!("output:    {}", session.settings().output.display());
}

fn write_snapshot(console: &ConsolePresenter, path: &std::path::Path) {
    let Some(frame) = console.last_preview() else {
        println!("No preview frame yet");
        return;
    };
    match PngWriter.write(&frame, path) {
        Ok(()) => println!("Snapshot saved: {}", path.display()),
        Err(e) => println!("Snapshot failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraDevice, CameraError, DeviceOpener, Frame};
    use crate::session::{SessionSettings, SessionState};
    use std::sync::mpsc;
    use std::sync::Arc;

    struct Solid;

    struct SolidDevice;

    impl CameraDevice for SolidDevice {
        fn read(&mut self) -> Option<Frame> {
            Frame::filled(8, 8, [10, 20, 30]).ok()
        }

        fn release(&mut self) {}
    }

    impl DeviceOpener for Solid {
        fn open(&mut self, _source_id: u32) -> Result<Box<dyn CameraDevice>, CameraError> {
            Ok(Box::new(SolidDevice))
        }
    }

    fn session(console: Arc<ConsolePresenter>, output: PathBuf) -> SessionController {
        let settings = SessionSettings {
            output,
            ..SessionSettings::default()
        };
        SessionController::new(Box::new(Solid), console, Box::new(PngWriter), settings)
            .with_template(Frame::filled(4, 4, [255, 255, 255]).unwrap())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(UserCommand::parse("start"), Ok(Some(UserCommand::Start)));
        assert_eq!(UserCommand::parse("  STOP "), Ok(Some(UserCommand::Stop)));
        assert_eq!(UserCommand::parse("p"), Ok(Some(UserCommand::Process)));
        assert_eq!(UserCommand::parse("save"), Ok(Some(UserCommand::Save)));
        assert_eq!(UserCommand::parse("q"), Ok(Some(UserCommand::Quit)));
        assert_eq!(UserCommand::parse(""), Ok(None));
        assert!(UserCommand::parse("dance").is_err());
    }

    #[test]
    fn test_parse_snapshot_path() {
        assert_eq!(
            UserCommand::parse("snapshot"),
            Ok(Some(UserCommand::Snapshot(PathBuf::from("snapshot.png"))))
        );
        assert_eq!(
            UserCommand::parse("snapshot shot.png"),
            Ok(Some(UserCommand::Snapshot(PathBuf::from("shot.png"))))
        );
    }

    #[test]
    fn test_run_scripted_session() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("result.png");
        let console = Arc::new(ConsolePresenter::new());
        let mut session = session(Arc::clone(&console), output.clone());

        let (tx, rx) = mpsc::channel();
        tx.send(Input::Line("start".into())).unwrap();
        drop(tx);

        // Start, then let the loop end on a closed channel; capture must stop
        run(&mut session, &console, rx, Duration::from_millis(5));
        assert!(!session.is_capturing());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_run_stops_on_interrupt() {
        let console = Arc::new(ConsolePresenter::new());
        let mut session = session(Arc::clone(&console), PathBuf::from("unused.png"));

        let (tx, rx) = mpsc::channel();
        tx.send(Input::Interrupt).unwrap();
        tx.send(Input::Line("start".into())).unwrap();

        run(&mut session, &console, rx, Duration::from_millis(5));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_capturing());
    }

    #[test]
    fn test_dispatch_quit_ends_loop() {
        let console = Arc::new(ConsolePresenter::new());
        let mut session = session(Arc::clone(&console), PathBuf::from("unused.png"));
        assert!(!dispatch(&mut session, &console, UserCommand::Quit));
        assert!(dispatch(&mut session, &console, UserCommand::Status));
    }

    #[test]
    fn test_dispatch_full_flow_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("result.png");
        let console = Arc::new(ConsolePresenter::new());
        let mut session = session(Arc::clone(&console), output.clone());

        dispatch(&mut session, &console, UserCommand::Start);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while session.live_frame().is_none() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        dispatch(&mut session, &console, UserCommand::Stop);
        dispatch(&mut session, &console, UserCommand::Process);
        dispatch(&mut session, &console, UserCommand::Save);

        assert_eq!(session.state(), SessionState::Saved);
        assert!(output.exists());
        assert!(console.preview_count() >= 1);
    }
}
