//! Text-input loop tests

use tokio::io::BufReader;
use tokio::sync::mpsc;
use voice_light::{LightState, run_text_loop};

mod common;

use common::FakeLight;

async fn run_with_input(input: &[u8], light: &FakeLight) {
    let (_tx, mut rx) = mpsc::channel(1);
    let stdin = tokio_test::io::Builder::new().read(input).build();
    run_text_loop(BufReader::new(stdin), light, &mut rx)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_dispatches_on_and_off() {
    let light = FakeLight::new();
    run_with_input(b"on\nOFF\n  On  \n", &light).await;

    assert_eq!(
        light.calls(),
        vec![LightState::On, LightState::Off, LightState::On]
    );
}

#[tokio::test]
async fn test_unknown_input_is_ignored() {
    let light = FakeLight::new();
    run_with_input(b"turn on\n\nlights\noff\n", &light).await;

    assert_eq!(light.calls(), vec![LightState::Off]);
}

#[tokio::test]
async fn test_quit_stops_reading() {
    for quit in ["quit", "exit", "q", "QUIT"] {
        let light = FakeLight::new();
        let input = format!("on\n{quit}\noff\n");
        run_with_input(input.as_bytes(), &light).await;

        assert_eq!(light.calls(), vec![LightState::On], "quit word: {quit}");
    }
}

#[tokio::test]
async fn test_invalid_utf8_line_is_skipped() {
    let light = FakeLight::new();
    run_with_input(b"\xff\xfe\non\nquit\n", &light).await;

    assert_eq!(light.calls(), vec![LightState::On]);
}

#[tokio::test]
async fn test_failed_request_keeps_loop_running() {
    let light = FakeLight::unreachable();
    run_with_input(b"on\noff\nquit\n", &light).await;

    assert_eq!(light.calls(), vec![LightState::On, LightState::Off]);
}

#[tokio::test]
async fn test_shutdown_signal_stops_loop() {
    let (tx, mut rx) = mpsc::channel(1);
    tx.send(()).await.unwrap();

    let light = FakeLight::new();
    let stdin = tokio_test::io::Builder::new().build();
    run_text_loop(BufReader::new(stdin), &light, &mut rx)
        .await
        .unwrap();

    assert!(light.calls().is_empty());
}
