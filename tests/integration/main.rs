//! Integration tests for Hoard

use sha2::{Digest as _, Sha256};
use std::path::Path;

fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

mod cli_tests {
    use super::*;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    /// A hoard command isolated to its own config and cache root
    fn hoard(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("hoard");
        cmd.env("HOARD_CONFIG", dir.path().join("config.toml"))
            .env("HOARD_ROOT", dir.path().join("cache"))
            .env("CI", "1");
        cmd
    }

    /// Write `content` as a source file and return its digest and URL
    fn source_file(dir: &TempDir, name: &str, content: &[u8]) -> (String, String) {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        (sha256_hex(content), file_url(&path))
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        hoard(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("content-addressed download cache"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        hoard(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("hoard"));
    }

    #[test]
    fn get_streams_to_stdout_and_commits() {
        let dir = TempDir::new().unwrap();
        let (digest, url) = source_file(&dir, "payload.bin", b"hello hoard");

        hoard(&dir)
            .args(["get", &digest, &url])
            .assert()
            .success()
            .stdout("hello hoard");

        let stored = dir.path().join("cache").join("store").join(&digest);
        assert_eq!(std::fs::read(stored).unwrap(), b"hello hoard");
        assert!(!dir.path().join("cache").join("tmp").join(&digest).exists());
    }

    #[test]
    fn get_serves_from_store_once_cached() {
        let dir = TempDir::new().unwrap();
        let (digest, url) = source_file(&dir, "payload.bin", b"cached once");

        hoard(&dir).args(["get", &digest, &url]).assert().success();
        std::fs::remove_file(dir.path().join("payload.bin")).unwrap();

        hoard(&dir)
            .args(["get", &digest, &url])
            .assert()
            .success()
            .stdout("cached once");
    }

    #[test]
    fn get_writes_output_file() {
        let dir = TempDir::new().unwrap();
        let (digest, url) = source_file(&dir, "payload.bin", b"to a file");
        let out = dir.path().join("out.bin");

        hoard(&dir)
            .args(["get", &digest, &url, "-o"])
            .arg(&out)
            .assert()
            .success()
            .stderr(predicate::str::contains("Wrote"));

        assert_eq!(std::fs::read(out).unwrap(), b"to a file");
    }

    #[test]
    fn get_accepts_bare_path_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, b"bare path").unwrap();
        let digest = sha256_hex(b"bare path");

        hoard(&dir)
            .args(["get", &digest])
            .arg(&path)
            .assert()
            .success()
            .stdout("bare path");
    }

    #[test]
    fn get_rejects_mismatched_content() {
        let dir = TempDir::new().unwrap();
        let (_, url) = source_file(&dir, "payload.bin", b"actual bytes");
        let wrong = sha256_hex(b"expected bytes");

        hoard(&dir)
            .args(["get", &wrong, &url])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Digest mismatch"));

        assert!(!dir.path().join("cache").join("store").join(&wrong).exists());
        assert!(!dir.path().join("cache").join("tmp").join(&wrong).exists());
    }

    #[test]
    fn get_rejects_invalid_digest() {
        let dir = TempDir::new().unwrap();
        let (_, url) = source_file(&dir, "payload.bin", b"irrelevant");

        hoard(&dir)
            .args(["get", "not-a-digest", &url])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid digest"));

        assert!(!dir.path().join("cache").exists());
    }

    #[test]
    fn get_reports_missing_source() {
        let dir = TempDir::new().unwrap();
        let digest = sha256_hex(b"nowhere");
        let url = file_url(&dir.path().join("missing.bin"));

        hoard(&dir)
            .args(["get", &digest, &url])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Source error"));

        assert!(!dir.path().join("cache").join("tmp").join(&digest).exists());
    }

    #[test]
    fn get_with_sha1_configured() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[cache]\nalgorithm = \"sha1\"\n",
        )
        .unwrap();
        let path = dir.path().join("legacy.bin");
        std::fs::write(&path, b"legacy digest").unwrap();
        let digest = hex::encode(sha1::Sha1::digest(b"legacy digest"));
        assert_eq!(digest.len(), 40);

        hoard(&dir)
            .args(["get", &digest, &file_url(&path)])
            .assert()
            .success()
            .stdout("legacy digest");
    }

    #[test]
    fn path_of_cached_entry() {
        let dir = TempDir::new().unwrap();
        let (digest, url) = source_file(&dir, "payload.bin", b"locate me");

        hoard(&dir).args(["get", &digest, &url]).assert().success();

        hoard(&dir)
            .args(["path", &digest])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("store/{}", digest)));
    }

    #[test]
    fn path_of_missing_entry_fails() {
        let dir = TempDir::new().unwrap();
        let digest = sha256_hex(b"absent");

        hoard(&dir)
            .args(["path", &digest])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not cached"));
    }

    #[test]
    fn verify_detects_corruption() {
        let dir = TempDir::new().unwrap();
        let (good, good_url) = source_file(&dir, "good.bin", b"good entry");
        let (bad, bad_url) = source_file(&dir, "bad.bin", b"bad entry");

        hoard(&dir).args(["get", &good, &good_url]).assert().success();
        hoard(&dir).args(["get", &bad, &bad_url]).assert().success();

        hoard(&dir)
            .args(["verify", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("ok {}", good)));

        std::fs::write(dir.path().join("cache").join("store").join(&bad), b"tampered").unwrap();

        hoard(&dir)
            .args(["verify", "--format", "json"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("\"corrupt\""))
            .stderr(predicate::str::contains("1 store entries failed verification"));
    }

    #[test]
    fn paranoid_get_refuses_corrupted_entry() {
        let dir = TempDir::new().unwrap();
        let (digest, url) = source_file(&dir, "payload.bin", b"pristine");

        hoard(&dir).args(["get", &digest, &url]).assert().success();
        std::fs::write(dir.path().join("cache").join("store").join(&digest), b"rotten").unwrap();

        hoard(&dir)
            .args(["--paranoid", "get", &digest, &url])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Digest mismatch"));
    }

    #[test]
    fn clean_removes_old_temps() {
        let dir = TempDir::new().unwrap();
        let tmp = dir.path().join("cache").join("tmp");
        std::fs::create_dir_all(&tmp).unwrap();
        let abandoned = tmp.join(sha256_hex(b"abandoned"));
        std::fs::write(&abandoned, b"partial").unwrap();

        let file = std::fs::File::options().write(true).open(&abandoned).unwrap();
        file.set_modified(std::time::SystemTime::now() - std::time::Duration::from_secs(600))
            .unwrap();
        drop(file);

        hoard(&dir)
            .args(["clean", "--older-than", "60", "--dry-run"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Would remove"));
        assert!(abandoned.exists());

        hoard(&dir)
            .args(["clean", "--older-than", "60"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Removed"));
        assert!(!abandoned.exists());
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        hoard(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        hoard(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn config_init_then_refuses_overwrite() {
        let dir = TempDir::new().unwrap();

        hoard(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Configuration initialized"));
        assert!(dir.path().join("config.toml").exists());

        hoard(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn invalid_config_fails_with_hint() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[cache\n").unwrap();

        hoard(&dir)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("hoard config init --force"));
    }
}

mod cache_tests {
    use super::*;
    use hoard::cache::{Algorithm, Cache, CacheOptions};
    use hoard::source::StaticSource;
    use std::time::Duration;
    use tempfile::TempDir;

    fn options() -> CacheOptions {
        CacheOptions::default().with_watch_interval(Duration::from_millis(10))
    }

    /// Two caches on one root model two processes: one fetch, both served
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_caches_share_one_fetch() {
        let dir = TempDir::new().unwrap();
        let content = vec![7u8; 200_000];
        let digest = sha256_hex(&content);

        let source = StaticSource::new()
            .with_chunk_size(1024)
            .with_delay(Duration::from_millis(1));
        source.insert(&digest, content.clone());

        let first = Cache::new(dir.path(), options(), source.clone(), Algorithm::Sha256);
        let second = Cache::new(dir.path(), options(), source.clone(), Algorithm::Sha256);

        let a = first.create_read_stream(&digest, ()).unwrap();
        // Let the first cache claim the temp file
        tokio::time::sleep(Duration::from_millis(20)).await;
        let b = second.create_read_stream(&digest, ()).unwrap();

        let (a, b) = tokio::join!(a.read_to_end(), b.read_to_end());
        assert_eq!(a.unwrap(), content);
        assert_eq!(b.unwrap(), content);
        assert_eq!(source.opens(), 1);
    }

    #[tokio::test]
    async fn stale_temp_from_dead_writer_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let content = b"after the crash".to_vec();
        let digest = sha256_hex(&content);

        let tmp_dir = dir.path().join("tmp");
        std::fs::create_dir_all(&tmp_dir).unwrap();
        let stale = tmp_dir.join(&digest);
        std::fs::write(&stale, b"half").unwrap();
        let file = std::fs::File::options().write(true).open(&stale).unwrap();
        file.set_modified(std::time::SystemTime::now() - Duration::from_secs(30))
            .unwrap();
        drop(file);

        let source = StaticSource::new();
        source.insert(&digest, content.clone());
        let cache = Cache::new(
            dir.path(),
            options().with_timeout(Duration::from_secs(2)),
            source.clone(),
            Algorithm::Sha256,
        );

        let bytes = cache
            .create_read_stream(&digest, ())
            .unwrap()
            .read_to_end()
            .await
            .unwrap();
        assert_eq!(bytes, content);
        assert_eq!(source.opens(), 1);
        assert!(!stale.exists());
    }
}
