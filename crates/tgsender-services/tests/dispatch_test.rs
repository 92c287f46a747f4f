use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use img_parts::png::{Png, PngChunk};
use mockito::Matcher;
use tgsender_core::{RouteReason, RoutingStrategyKind};
use tgsender_services::{Dispatcher, ImageSavedEvent, SenderConfig};
use tokio::runtime::Handle;

fn config(api_base: String, mapping: &str) -> SenderConfig {
    SenderConfig {
        bot_token: "123:abc".to_string(),
        channel_mapping: mapping.to_string(),
        api_base,
        retry_delay: Duration::from_millis(5),
        ..SenderConfig::default()
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    buffer
}

fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(width, height)).unwrap();
    path
}

fn write_png_with_parameters(dir: &Path, name: &str, parameters: &str) -> PathBuf {
    let mut png = Png::from_bytes(png_bytes(8, 8).into()).unwrap();
    let mut contents = b"parameters\0".to_vec();
    contents.extend_from_slice(parameters.as_bytes());
    let len = png.chunks().len();
    png.chunks_mut()
        .insert(len - 1, PngChunk::new(*b"tEXt", contents.into()));

    let path = dir.join(name);
    std::fs::write(&path, png.encoder().bytes()).unwrap();
    path
}

fn chat(id: &str) -> Matcher {
    Matcher::Regex(format!(r#"name="chat_id"\s+{}\s"#, id))
}

#[tokio::test]
async fn test_filename_tag_routes_to_mapped_chat() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/bot123:abc/sendPhoto")
        .match_body(chat("1001"))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "0001-modelX-lora SomeLora.png", 16, 16);

    let dispatcher =
        Dispatcher::new(config(server.url(), "lora somelora:1001"), Handle::current()).unwrap();
    let report = dispatcher
        .on_image_saved(&ImageSavedEvent::new(&path))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.decision.destination(), Some("1001"));
    assert_eq!(report.decision.reason, RouteReason::LoraMatch);
    let photo = report.photo.unwrap();
    assert!(photo.success);
    assert_eq!(photo.attempts_made, 1);
    assert!(report.document.is_none());
    assert!(path.exists());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_nsfw_prompt_overrides_lora_table() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/bot123:abc/sendPhoto")
        .match_body(chat("999"))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = write_png_with_parameters(
        dir.path(),
        "00002-1234.png",
        "masterpiece, nsfw woman <lora:SomeLora:0.8>\nNegative prompt: blurry\nSteps: 20, Sampler: Euler a",
    );

    let mut cfg = config(server.url(), "lora somelora:1001");
    cfg.nsfw_channel = Some("999".to_string());
    let dispatcher = Dispatcher::new(cfg, Handle::current()).unwrap();
    let report = dispatcher.dispatch(&ImageSavedEvent::new(&path)).await;

    assert_eq!(report.decision.destination(), Some("999"));
    assert_eq!(report.decision.reason, RouteReason::NsfwOverride);
    assert!(report.photo.unwrap().success);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_full_resolution_sends_resized_photo_and_original_document() {
    let mut server = mockito::Server::new_async().await;
    let photo_mock = server
        .mock("POST", "/bot123:abc/sendPhoto")
        .match_body(Matcher::Regex(
            r#"name="photo"; filename.+_resized\.jpg"#.to_string(),
        ))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create_async()
        .await;
    let document_mock = server
        .mock("POST", "/bot123:abc/sendDocument")
        .match_body(Matcher::Regex(
            r#"name="document"; filename.+Foo\.png"#.to_string(),
        ))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "big-lora Foo.png", 300, 200);

    let mut cfg = config(server.url(), "lora foo:42");
    cfg.full_resolution = true;
    cfg.portrait_max_size = 100;
    cfg.landscape_max_width = 150;
    let dispatcher = Dispatcher::new(cfg, Handle::current()).unwrap();
    let report = dispatcher.dispatch(&ImageSavedEvent::new(&path)).await;

    assert!(report.photo.unwrap().success);
    assert!(report.document.unwrap().success);
    assert!(path.exists());
    assert!(!dir.path().join("big-lora Foo_resized.jpg").exists());
    photo_mock.assert_async().await;
    document_mock.assert_async().await;
}

#[tokio::test]
async fn test_failed_delivery_stops_at_retry_bound_and_keeps_artifact() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/bot123:abc/sendPhoto")
        .with_status(500)
        .with_body(r#"{"ok":false,"description":"Internal Server Error"}"#)
        .expect(2)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "wide-lora Foo.png", 300, 200);

    let mut cfg = config(server.url(), "lora foo:42");
    cfg.retry_count = 2;
    cfg.landscape_max_width = 150;
    let dispatcher = Dispatcher::new(cfg, Handle::current()).unwrap();
    let report = dispatcher.dispatch(&ImageSavedEvent::new(&path)).await;

    let photo = report.photo.unwrap();
    assert!(!photo.success);
    assert_eq!(photo.attempts_made, 2);
    assert!(photo.last_error.unwrap().contains("Internal Server Error"));
    assert!(dir.path().join("wide-lora Foo_resized.jpg").exists());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_grid_images_are_not_sent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let grids = dir.path().join("outputs").join("grids");
    std::fs::create_dir_all(&grids).unwrap();
    let path = write_png(&grids, "grid-0001-lora Foo.png", 16, 16);

    let dispatcher =
        Dispatcher::new(config(server.url(), "lora foo:42"), Handle::current()).unwrap();
    assert!(dispatcher.on_image_saved(&ImageSavedEvent::new(&path)).is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_classifier_strategy_routes_to_nsfw_channel() {
    let mut server = mockito::Server::new_async().await;
    let classifier_mock = server
        .mock("POST", "/classify")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"label":"nsfw","score":0.93}"#)
        .expect(1)
        .create_async()
        .await;
    let send_mock = server
        .mock("POST", "/bot123:abc/sendPhoto")
        .match_body(chat("999"))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = write_png(dir.path(), "0003-lora Foo.png", 16, 16);

    let mut cfg = config(server.url(), "lora foo:42");
    cfg.nsfw_channel = Some("999".to_string());
    cfg.routing_strategy = RoutingStrategyKind::Classifier;
    cfg.nsfw_classifier_url = Some(format!("{}/classify", server.url()));
    let dispatcher = Dispatcher::new(cfg, Handle::current()).unwrap();
    let report = dispatcher.dispatch(&ImageSavedEvent::new(&path)).await;

    assert_eq!(report.decision.reason, RouteReason::NsfwOverride);
    assert!(report.photo.unwrap().success);
    classifier_mock.assert_async().await;
    send_mock.assert_async().await;
}

#[tokio::test]
async fn test_embedded_lora_tag_routes_to_mapped_chat() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/bot123:abc/sendPhoto")
        .match_body(chat("CHAT1"))
        .with_status(200)
        .with_body(r#"{"ok":true}"#)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = write_png_with_parameters(
        dir.path(),
        "00003-5678.png",
        "a portrait <lora:Foo:0.8>\nNegative prompt: blurry\nSteps: 20, Sampler: Euler a",
    );

    let dispatcher =
        Dispatcher::new(config(server.url(), "lora foo:CHAT1"), Handle::current()).unwrap();
    let report = dispatcher.dispatch(&ImageSavedEvent::new(&path)).await;

    assert_eq!(report.decision.destination(), Some("CHAT1"));
    assert_eq!(report.decision.reason, RouteReason::LoraMatch);
    assert!(report.photo.unwrap().success);
    mock.assert_async().await;
}
