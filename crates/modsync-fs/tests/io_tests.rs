use modsync_fs::{NormalizedPath, io};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_write_atomic_creates_file_and_parents() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("nested/dir/test.txt"));

    io::write_atomic(&path, b"hello world").unwrap();

    let content = fs::read_to_string(path.to_native()).unwrap();
    assert_eq!(content, "hello world");
}

#[test]
fn test_write_atomic_overwrites_existing() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("test.txt");
    fs::write(&file_path, "original").unwrap();

    let path = NormalizedPath::new(&file_path);
    io::write_atomic(&path, b"updated").unwrap();

    assert_eq!(fs::read_to_string(&file_path).unwrap(), "updated");
}

#[test]
fn test_write_atomic_leaves_no_temp_file() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("modules.mod"));

    io::write_text(&path, "content").unwrap();

    let leftovers: Vec<_> = fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
}

#[test]
fn test_read_text_nonexistent_file() {
    let path = NormalizedPath::new("/nonexistent/file.txt");
    assert!(io::read_text(&path).is_err());
}

#[test]
fn test_append_line_once_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join(".gitignore"));

    assert!(io::append_line_once(&path, "# synced", "*").unwrap());
    assert!(!io::append_line_once(&path, "# synced", "*").unwrap());

    let content = fs::read_to_string(path.to_native()).unwrap();
    assert_eq!(content, "# synced\n*\n");
}

#[test]
fn test_append_line_once_preserves_existing_rules() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join(".gitignore");
    fs::write(&file, "target/").unwrap();
    let path = NormalizedPath::new(&file);

    io::append_line_once(&path, "# synced", "*").unwrap();

    let content = fs::read_to_string(&file).unwrap();
    assert_eq!(content, "target/\n\n# synced\n*\n");
}

#[test]
fn test_copy_dir_all_copies_nested_tree() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(src.join("a/b")).unwrap();
    fs::write(src.join("top.txt"), "top").unwrap();
    fs::write(src.join("a/b/deep.txt"), "deep").unwrap();

    let dst = temp.path().join("dst");
    io::copy_dir_all(&src, &dst).unwrap();

    assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
    assert_eq!(fs::read_to_string(dst.join("a/b/deep.txt")).unwrap(), "deep");
}

#[cfg(unix)]
#[test]
fn test_remove_dir_or_link_keeps_link_target() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("target");
    fs::create_dir(&target).unwrap();
    fs::write(target.join("keep.txt"), "keep").unwrap();

    let link = temp.path().join("link");
    io::symlink_dir(&target, &link).unwrap();
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());

    assert!(io::remove_dir_or_link(&link).unwrap());
    assert!(fs::symlink_metadata(&link).is_err());
    assert!(target.join("keep.txt").exists());
}

#[test]
fn test_remove_dir_or_link_removes_tree() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("tree");
    fs::create_dir_all(dir.join("inner")).unwrap();
    fs::write(dir.join("inner/file"), "x").unwrap();

    assert!(io::remove_dir_or_link(&dir).unwrap());
    assert!(!dir.exists());
}

#[cfg(unix)]
#[test]
fn test_copy_dir_all_skips_link_back_to_ancestor() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(src.join("pkg")).unwrap();
    fs::write(src.join("top.txt"), "top").unwrap();
    std::os::unix::fs::symlink(".", src.join("self")).unwrap();
    std::os::unix::fs::symlink("..", src.join("pkg/up")).unwrap();

    let dst = temp.path().join("dst");
    io::copy_dir_all(&src, &dst).unwrap();

    assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
    assert!(dst.join("pkg").is_dir());
    assert!(!dst.join("self").exists());
    assert!(!dst.join("pkg/up").exists());
}

#[cfg(unix)]
#[test]
fn test_copy_dir_all_follows_link_to_sibling_tree() {
    let temp = TempDir::new().unwrap();
    let shared = temp.path().join("shared");
    fs::create_dir(&shared).unwrap();
    fs::write(shared.join("util.py"), "u = 1").unwrap();

    let src = temp.path().join("src");
    fs::create_dir(&src).unwrap();
    std::os::unix::fs::symlink(&shared, src.join("shared")).unwrap();

    let dst = temp.path().join("dst");
    io::copy_dir_all(&src, &dst).unwrap();

    assert_eq!(fs::read_to_string(dst.join("shared/util.py")).unwrap(), "u = 1");
    assert!(!fs::symlink_metadata(dst.join("shared")).unwrap().file_type().is_symlink());
}
