mod common;

use std::io::Write;
use std::time::Duration;

use common::{connected_session, MockController};
use ppmac_control::{PmacError, Session, TransportError};
use tempfile::NamedTempFile;

fn program_file(text: &str) -> NamedTempFile {
    program_bytes(text.as_bytes())
}

fn program_bytes(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_lines_then_close() {
    let controller = MockController::replying("");
    let session = connected_session(&controller).await;
    let file = program_file("open prog 1\n\nlinear abs\r\nX10\nclose");

    session.download_program(file.path()).await.unwrap();

    assert_eq!(
        controller.writes(),
        vec!["open prog 1\n", "linear abs\r\n", "X10\n", "close\n", "close\n"]
    );
}

#[tokio::test]
async fn test_crlf_lines_sent_verbatim() {
    let controller = MockController::new(|cmd| {
        assert!(cmd == "close" || cmd.ends_with('\r'), "CR stripped from {:?}", cmd);
        Ok(String::new())
    });
    let session = connected_session(&controller).await;
    let file = program_file("a\r\n\r\nb\r\n");

    session.download_program(file.path()).await.unwrap();

    assert_eq!(controller.writes(), vec!["a\r\n", "b\r\n", "close\n"]);
}

#[tokio::test]
async fn test_non_utf8_lines_are_downloaded() {
    let controller = MockController::replying("");
    let session = connected_session(&controller).await;
    let file = program_bytes(b"open prog 1\nX10 // 90\xB0 turn\nX20\n");

    session.download_program(file.path()).await.unwrap();

    assert_eq!(
        controller.writes(),
        vec!["open prog 1\n", "X10 // 90\u{FFFD} turn\n", "X20\n", "close\n"],
        "Every line, Latin-1 comment included, should reach the controller"
    );
}

#[tokio::test]
async fn test_failed_line_aborts_but_still_closes() {
    let controller = MockController::new(|cmd| match cmd {
        "bad line" => Ok("stdin:2:1: error #20: ILLEGAL CMD".to_string()),
        _ => Ok(String::new()),
    });
    let session = connected_session(&controller).await;
    let file = program_file("open plc 1\nbad line\nnever sent\n");

    let err = session.download_program(file.path()).await.unwrap_err();

    assert_eq!(err, PmacError::Controller(20));
    assert_eq!(controller.writes(), vec!["open plc 1\n", "bad line\n", "close\n"]);
}

#[tokio::test]
async fn test_close_failure_reported_as_program_close() {
    let controller = MockController::new(|cmd| match cmd {
        "close" => Err(TransportError::ReadTimeout),
        _ => Ok(String::new()),
    });
    let session = connected_session(&controller).await;
    let file = program_file("open prog 2\nX1\n");

    let err = session.download_program(file.path()).await.unwrap_err();
    assert_eq!(err, PmacError::ProgramClose);
    assert_eq!(err.code(), -236);
}

#[tokio::test]
async fn test_first_error_wins_over_close_failure() {
    let controller = MockController::new(|cmd| match cmd {
        "X2" => Err(TransportError::WriteTimeout),
        "close" => Err(TransportError::ReadTimeout),
        _ => Ok(String::new()),
    });
    let session = connected_session(&controller).await;
    let file = program_file("X1\nX2\nX3\n");

    let err = session.download_program(file.path()).await.unwrap_err();
    assert_eq!(err, PmacError::Transport(TransportError::WriteTimeout));
}

#[tokio::test]
async fn test_no_close_for_empty_file() {
    let controller = MockController::replying("");
    let session = connected_session(&controller).await;

    let file = program_file("\n\n");
    session.download_program(file.path()).await.unwrap();
    assert!(controller.writes().is_empty());
}

#[tokio::test]
async fn test_rejected_first_line_still_closes() {
    let controller = MockController::replying("error #1: nope");
    let session = connected_session(&controller).await;

    let file = program_file("first\nsecond\n");
    let err = session.download_program(file.path()).await.unwrap_err();
    assert_eq!(err, PmacError::Controller(1));
    assert_eq!(controller.writes(), vec!["first\n", "close\n"]);
}

#[tokio::test]
async fn test_timed_out_first_line_still_closes() {
    let controller = MockController::new(|cmd| match cmd {
        "open prog 1" => Err(TransportError::ReadTimeout),
        _ => Ok(String::new()),
    });
    let session = connected_session(&controller).await;
    let file = program_file("open prog 1\nX1\n");

    let err = session.download_program(file.path()).await.unwrap_err();

    assert_eq!(err, PmacError::Transport(TransportError::ReadTimeout));
    assert_eq!(
        controller.writes(),
        vec!["open prog 1\n", "close\n"],
        "A buffer the controller may have opened must be closed"
    );
}

#[tokio::test]
async fn test_missing_file_fails_before_io() {
    let controller = MockController::replying("");
    let session = connected_session(&controller).await;
    let dir = tempfile::tempdir().unwrap();

    let err = session
        .download_program(dir.path().join("missing.pmc"))
        .await
        .unwrap_err();
    assert_eq!(err, PmacError::FileOpen);
    assert!(controller.events().is_empty());
}

#[tokio::test]
async fn test_download_requires_connection() {
    let controller = MockController::replying("");
    let session = Session::new(controller.factory());
    let file = program_file("X1\n");

    assert_eq!(session.download_program(file.path()).await, Err(PmacError::NoTransportSet));
}

#[tokio::test]
async fn test_download_holds_gate_for_whole_file() {
    let controller = MockController::with_delay(|_| Ok(String::new()), Duration::from_millis(40));
    let session = connected_session(&controller).await;
    let file = program_file("A1\nA2\nA3\nA4\n");

    let download = session.download_program(file.path());
    let intruder = async {
        tokio::time::sleep(Duration::from_millis(45)).await;
        session.send_command("B").await
    };
    let (download, intruder) = tokio::join!(download, intruder);

    download.unwrap();
    assert_eq!(intruder, Err(PmacError::SemaphoreTimeout));
    assert_eq!(controller.writes(), vec!["A1\n", "A2\n", "A3\n", "A4\n", "close\n"]);
}
