use crate::error::{DefectVisionError, Result};
use crate::image::mime_type_for;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
}

pub fn scan_folder(folder: &Path) -> Result<Vec<ImageInfo>> {
    if !folder.exists() {
        return Err(DefectVisionError::FolderNotFound(folder.display().to_string()));
    }

    let mut images = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1)  // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() || !is_image_path(path) {
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        images.push(ImageInfo {
            path: path.to_path_buf(),
            file_name,
        });
    }

    // ファイル名でソート
    images.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(images)
}

/// 解析対象の画像か（MIMEタイプを推定できる拡張子のみ）
pub fn is_image_path(path: &Path) -> bool {
    mime_type_for(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("a.jpg")));
        assert!(is_image_path(Path::new("a.JPG")));
        assert!(is_image_path(Path::new("a.webp")));
        assert!(is_image_path(Path::new("a.gif")));
        assert!(!is_image_path(Path::new("a.txt")));
        assert!(!is_image_path(Path::new("README")));
    }

    #[test]
    fn test_is_image_path_matches_allowed_types() {
        for ext in crate::image::ALLOWED_IMAGE_TYPES {
            let path = PathBuf::from(format!("part.{}", ext));
            assert!(is_image_path(&path), "{} が対象外", ext);
        }
        assert!(!is_image_path(Path::new("part.bmp")));
    }

    #[test]
    fn test_scan_folder_not_found() {
        let result = scan_folder(Path::new("/nonexistent/folder"));
        assert!(matches!(result, Err(DefectVisionError::FolderNotFound(_))));
    }

    #[test]
    fn test_scan_folder_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();

        File::create(dir.path().join("c.png")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.path().join("a.jpeg")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.path().join("b.WEBP")).unwrap().write_all(b"dummy").unwrap();
        File::create(dir.path().join("notes.txt")).unwrap().write_all(b"text").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        File::create(dir.path().join("nested").join("d.jpg")).unwrap();

        let result = scan_folder(dir.path()).unwrap();
        let names: Vec<_> = result.iter().map(|i| i.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.jpeg", "b.WEBP", "c.png"]);
    }
}
