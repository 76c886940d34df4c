//! Live integration tests against the real Kuaipan service.
//!
//! These tests are ignored by default. Run with:
//! ```bash
//! export KUAIPAN_CONSUMER_KEY=your-consumer-key
//! export KUAIPAN_CONSUMER_SECRET=your-consumer-secret
//! export KUAIPAN_ACCESS_KEY=your-access-key
//! export KUAIPAN_ACCESS_SECRET=your-access-secret
//!
//! cargo test --test live -- --ignored --nocapture
//! ```

use std::io::Cursor;

use kuaipan::{Client, MetadataOptions};

/// Create client using credentials from environment variables
fn live_client() -> Client {
    let _ = env_logger::builder().is_test(true).try_init();
    Client::from_env().expect("failed to create client from environment")
}

#[test]
#[ignore = "requires real Kuaipan credentials"]
fn live_account_info() {
    let client = live_client();

    let info = client.account_info().expect("account_info failed");

    println!("=== AccountInfo ===");
    println!("UserId: {}", info.user_id);
    println!("UserName: {}", info.user_name);
    println!("Quota: {}/{}", info.quota_used, info.quota_total);
}

#[test]
#[ignore = "requires real Kuaipan credentials"]
fn live_upload_list_download_delete() {
    let client = live_client();
    let payload = b"kuaipan live test payload".to_vec();
    let len = payload.len() as u64;

    let uploaded = client
        .upload_from("/kuaipan-rs-live.txt", Cursor::new(payload.clone()), len, true)
        .expect("upload failed");
    assert_eq!(uploaded.size, len);

    let root = client
        .metadata(
            "/",
            &MetadataOptions {
                list: Some(true),
                ..Default::default()
            },
        )
        .expect("metadata failed");
    assert!(root.files.iter().any(|f| f.name == "kuaipan-rs-live.txt"));

    let downloaded = client
        .download("/kuaipan-rs-live.txt")
        .expect("download failed");
    assert_eq!(downloaded, payload);

    client
        .delete("/kuaipan-rs-live.txt", true)
        .expect("delete failed");
}
