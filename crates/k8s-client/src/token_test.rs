//! Unit tests for token module

#[cfg(test)]
mod tests {
    use crate::error::ClientError;
    use crate::mock::ManualFileNotifier;
    use crate::token::TokenStore;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn write_token(path: &Path, token: &str) {
        std::fs::write(path, token).expect("token file should be writable");
    }

    fn token_file(dir: &tempfile::TempDir, token: &str) -> PathBuf {
        let path = dir.path().join("token");
        write_token(&path, token);
        path
    }

    #[test]
    fn test_initial_load_trims_trailing_newline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = token_file(&dir, "first-token\n");

        let store = TokenStore::from_file_with_notifier(&path, &ManualFileNotifier::new())
            .expect("store should load");

        assert_eq!(store.current_token(), "first-token");
        assert_eq!(store.path(), Some(path.as_path()));
    }

    #[test]
    fn test_missing_file_fails_construction() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("does-not-exist");

        let err = TokenStore::from_file_with_notifier(&missing, &ManualFileNotifier::new())
            .expect_err("missing token file must fail");

        match err {
            ClientError::Io { path, .. } => assert_eq!(path, missing),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_listener_setup_failure_fails_construction() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = token_file(&dir, "token");

        let err = TokenStore::from_file_with_notifier(&path, &ManualFileNotifier::failing("inotify limit reached"))
            .expect_err("listener failure must fail construction");

        assert!(matches!(err, ClientError::FileWatch(ref msg) if msg.contains("inotify")));
    }

    #[test]
    fn test_write_event_replaces_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = token_file(&dir, "old");
        let notifier = ManualFileNotifier::new();
        let store = TokenStore::from_file_with_notifier(&path, &notifier).expect("store should load");

        write_token(&path, "new");
        assert_eq!(store.current_token(), "old", "token only changes on a file event");

        assert_eq!(notifier.trigger(&path), 1);
        assert_eq!(store.current_token(), "new");
    }

    #[test]
    fn test_clones_share_refreshed_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = token_file(&dir, "old");
        let notifier = ManualFileNotifier::new();
        let store = TokenStore::from_file_with_notifier(&path, &notifier).expect("store should load");
        let clone = store.clone();

        write_token(&path, "new");
        notifier.trigger(&path);

        assert_eq!(clone.current_token(), "new");
    }

    #[test]
    fn test_failed_refresh_keeps_previous_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = token_file(&dir, "last-known-good");
        let notifier = ManualFileNotifier::new();
        let store = TokenStore::from_file_with_notifier(&path, &notifier).expect("store should load");

        std::fs::remove_file(&path).expect("token file should be removable");
        notifier.trigger(&path);
        assert_eq!(store.current_token(), "last-known-good");
        assert!(!store.reload());

        // Truncated mid-rewrite
        write_token(&path, "");
        notifier.trigger(&path);
        assert_eq!(store.current_token(), "last-known-good");
    }

    #[test]
    fn test_reload_without_event() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = token_file(&dir, "one");
        let store = TokenStore::from_file_with_notifier(&path, &ManualFileNotifier::new())
            .expect("store should load");

        write_token(&path, "two");
        assert!(store.reload());
        assert_eq!(store.current_token(), "two");
    }

    #[test]
    fn test_fixed_and_anonymous_stores() {
        let fixed = TokenStore::fixed("static");
        assert_eq!(fixed.current_token(), "static");
        assert!(!fixed.reload());
        assert!(fixed.path().is_none());

        assert_eq!(TokenStore::anonymous().current_token(), "");
    }

    #[test]
    fn test_debug_redacts_token() {
        let store = TokenStore::fixed("super-secret");
        assert!(!format!("{store:?}").contains("super-secret"));
    }

    #[test]
    fn test_concurrent_readers_see_whole_tokens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = "a".repeat(4096);
        let b = "b".repeat(4096);
        let path = token_file(&dir, &a);
        let notifier = ManualFileNotifier::new();
        let store = TokenStore::from_file_with_notifier(&path, &notifier).expect("store should load");

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let (a, b) = (a.clone(), b.clone());
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let token = store.current_token();
                        assert!(token == a || token == b, "observed a torn token");
                    }
                })
            })
            .collect();

        for i in 0..50 {
            // Write to a sibling file and rename so the refresh never reads a half-written file
            let staging = dir.path().join("token.tmp");
            let mut file = std::fs::File::create(&staging).expect("staging file");
            file.write_all(if i % 2 == 0 { b.as_bytes() } else { a.as_bytes() })
                .expect("staging write");
            drop(file);
            std::fs::rename(&staging, &path).expect("rename");
            notifier.trigger(&path);
        }

        for reader in readers {
            reader.join().expect("reader thread should not panic");
        }
    }

    #[test]
    fn test_store_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TokenStore>();
        assert_send_sync::<Arc<TokenStore>>();
    }

    fn wait_for_token(store: &TokenStore, expected: &str) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while store.current_token() != expected {
            assert!(
                Instant::now() < deadline,
                "token was not refreshed to {expected:?}, still {:?}",
                store.current_token()
            );
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    /// Publish `token` the way the kubelet updates a projected volume: write a
    /// new timestamped directory, then atomically swap the `..data` symlink.
    #[cfg(unix)]
    fn rotate_projected(dir: &Path, generation: u32, token: &str) {
        let data = dir.join(format!("..2026_10_19_{generation:02}"));
        std::fs::create_dir(&data).expect("data dir");
        write_token(&data.join("token"), token);

        let staging = dir.join("..data_tmp");
        std::os::unix::fs::symlink(data.file_name().expect("dir name"), &staging).expect("staging link");
        std::fs::rename(&staging, dir.join("..data")).expect("swap ..data");
    }

    #[cfg(unix)]
    #[test]
    fn test_projected_token_rotation_detected_repeatedly() {
        let dir = tempfile::tempdir().expect("tempdir");
        rotate_projected(dir.path(), 1, "generation-1");
        let path = dir.path().join("token");
        std::os::unix::fs::symlink("..data/token", &path).expect("token link");

        let store = TokenStore::from_file(&path).expect("store should load");
        assert_eq!(store.current_token(), "generation-1");

        rotate_projected(dir.path(), 2, "generation-2");
        wait_for_token(&store, "generation-2");

        // A watch on the file itself would have gone stale after the first swap
        rotate_projected(dir.path(), 3, "generation-3");
        wait_for_token(&store, "generation-3");
    }

    #[test]
    fn test_file_rewrite_detected_by_platform_watcher() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = token_file(&dir, "before-rotation");
        let store = TokenStore::from_file(&path).expect("store should load");
        assert_eq!(store.current_token(), "before-rotation");

        write_token(&path, "after-rotation");
        wait_for_token(&store, "after-rotation");
    }
}
