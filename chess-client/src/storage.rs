//! 局面存档
//!
//! 存档文件只有一行：当前局面的 FEN。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use protocol::Fen;

/// 存档文件扩展名
const SAVE_EXTENSION: &str = "fen";

/// 存档目录管理器
pub struct SnapshotStore {
    saves_dir: PathBuf,
}

impl SnapshotStore {
    /// 使用系统数据目录下的默认存档目录
    pub fn new() -> Result<Self> {
        Self::with_dir(get_saves_directory()?)
    }

    /// 使用指定目录，不存在时创建
    pub fn with_dir(saves_dir: impl Into<PathBuf>) -> Result<Self> {
        let saves_dir = saves_dir.into();
        if !saves_dir.exists() {
            fs::create_dir_all(&saves_dir)
                .with_context(|| format!("无法创建存储目录: {:?}", saves_dir))?;
        }

        Ok(Self { saves_dir })
    }

    /// 以时间戳命名保存局面，返回文件路径
    pub fn save(&self, fen: &Fen, label: &str) -> Result<PathBuf> {
        let filename = generate_filename(&Local::now(), label);
        let filepath = self.saves_dir.join(&filename);

        save_position(&filepath, fen)?;
        tracing::info!("局面已保存: {}", filename);
        Ok(filepath)
    }

    /// 列出所有存档，最新的在前；无法解析的文件被跳过
    pub fn list(&self) -> Result<Vec<SavedPosition>> {
        let mut saves = Vec::new();

        let entries = fs::read_dir(&self.saves_dir)
            .with_context(|| format!("读取存储目录失败: {:?}", self.saves_dir))?;

        for entry in entries {
            let entry = entry.context("读取目录项失败")?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) != Some(SAVE_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };

            match load_position(&path) {
                Ok(fen) => {
                    let saved_at = entry
                        .metadata()
                        .and_then(|m| m.modified())
                        .map(DateTime::<Utc>::from)
                        .unwrap_or_else(|_| Utc::now());
                    saves.push(SavedPosition {
                        name,
                        path,
                        saved_at,
                        fen,
                    });
                }
                Err(e) => {
                    tracing::warn!("跳过损坏的存档 {}: {:#}", name, e);
                }
            }
        }

        saves.sort_by(|a, b| {
            b.saved_at
                .cmp(&a.saved_at)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(saves)
    }

    /// 获取存储目录路径
    pub fn saves_directory(&self) -> &Path {
        &self.saves_dir
    }
}

/// 存档条目
#[derive(Debug, Clone)]
pub struct SavedPosition {
    /// 文件名
    pub name: String,
    pub path: PathBuf,
    pub saved_at: DateTime<Utc>,
    pub fen: Fen,
}

impl SavedPosition {
    /// 格式化保存时间
    pub fn formatted_time(&self) -> String {
        self.saved_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }
}

/// 把局面写成单行文件
pub fn save_position(path: &Path, fen: &Fen) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建目录: {:?}", parent))?;
        }
    }

    fs::write(path, format!("{}\n", fen.as_str()))
        .with_context(|| format!("写入文件失败: {:?}", path))
}

/// 读取存档的第一行并解析为局面
pub fn load_position(path: &Path) -> Result<Fen> {
    let content =
        fs::read_to_string(path).with_context(|| format!("读取文件失败: {:?}", path))?;

    let line = content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .with_context(|| format!("存档为空: {:?}", path))?;

    Fen::parse(line).with_context(|| format!("存档中的 FEN 无效: {:?}", path))
}

/// 获取跨平台存储目录
fn get_saves_directory() -> Result<PathBuf> {
    let app_data_dir = dirs::data_dir().context("无法获取应用数据目录")?;

    Ok(app_data_dir.join("online-chess").join("saves"))
}

fn generate_filename(timestamp: &DateTime<Local>, label: &str) -> String {
    let timestamp_str = timestamp.format("%Y%m%d_%H%M%S").to_string();
    let label = sanitize_filename(label);

    if label.is_empty() {
        format!("{}.{}", timestamp_str, SAVE_EXTENSION)
    } else {
        format!("{}_{}.{}", timestamp_str, label, SAVE_EXTENSION)
    }
}

/// 清理文件名中的特殊字符
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ITALIAN: &str = "r1bqk1nr/pppp1ppp/2n5/2b1p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4";

    #[test]
    fn test_save_and_load_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.fen");
        let fen = Fen::parse(ITALIAN).unwrap();

        save_position(&path, &fen).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{}\n", ITALIAN));
        assert_eq!(load_position(&path).unwrap(), fen);
    }

    #[test]
    fn test_round_trip_keeps_rights_and_clocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ep.fen");
        let fen =
            Fen::parse("rnbqkbnr/ppp1pppp/8/8/3pP3/5N2/PPPP1PPP/RNBQKB1R b Kq e3 0 3").unwrap();

        save_position(&path, &fen).unwrap();
        let loaded = load_position(&path).unwrap();
        assert_eq!(loaded, fen);
        assert_eq!(loaded.side_to_move(), protocol::Side::Black);
        assert_eq!(loaded.halfmove_clock(), 0);
        assert_eq!(loaded.fullmove_number(), 3);
        assert!(loaded.as_str().contains(" Kq e3 "));
    }

    #[test]
    fn test_load_uses_first_line_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.fen");
        fs::write(&path, format!("  {}  \r\nsecond line\n", ITALIAN)).unwrap();

        assert_eq!(load_position(&path).unwrap().as_str(), ITALIAN);
    }

    #[test]
    fn test_load_rejects_bad_files() {
        let dir = tempfile::tempdir().unwrap();

        let empty = dir.path().join("empty.fen");
        fs::write(&empty, "").unwrap();
        assert!(load_position(&empty).is_err());

        let garbage = dir.path().join("garbage.fen");
        fs::write(&garbage, "not a position\n").unwrap();
        assert!(load_position(&garbage).is_err());

        assert!(load_position(&dir.path().join("missing.fen")).is_err());
    }

    #[test]
    fn test_store_lists_valid_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::with_dir(dir.path().join("saves")).unwrap();
        assert!(store.saves_directory().exists());

        let saved = store.save(&Fen::initial(), "white").unwrap();
        assert!(saved.file_name().unwrap().to_str().unwrap().ends_with("_white.fen"));
        store.save(&Fen::parse(ITALIAN).unwrap(), "black").unwrap();

        // 损坏的存档与其他文件被忽略
        fs::write(store.saves_directory().join("broken.fen"), "xyz\n").unwrap();
        fs::write(store.saves_directory().join("notes.txt"), "hello\n").unwrap();

        let saves = store.list().unwrap();
        assert_eq!(saves.len(), 2);
        assert!(saves.iter().any(|s| s.fen == Fen::initial()));
        assert!(saves.iter().any(|s| s.fen.as_str() == ITALIAN));
    }

    #[test]
    fn test_generate_filename() {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(generate_filename(&ts, "white"), "20240309_140507_white.fen");
        assert_eq!(generate_filename(&ts, "a/b c"), "20240309_140507_a_b_c.fen");
        assert_eq!(generate_filename(&ts, ""), "20240309_140507.fen");
    }
}
