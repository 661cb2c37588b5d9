use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{Local, NaiveDateTime};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::EmbeddingStore;

/// 用户偏好记录，第一次点赞时创建
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferenceProfile {
    pub liked_images: BTreeSet<String>,
    pub created_at: NaiveDateTime,
}

impl UserPreferenceProfile {
    fn new() -> Self {
        Self { liked_images: BTreeSet::new(), created_at: Local::now().naive_local() }
    }
}

type Profiles = HashMap<String, Arc<Mutex<UserPreferenceProfile>>>;

/// 以钱包地址为键的用户偏好存储
///
/// 不同钱包的修改互不阻塞，同一钱包的修改串行执行。每次修改后都会把完整快照写入文件，
/// 写入失败只记录日志，内存中的修改仍然保留。
pub struct PreferenceStore {
    path: Option<PathBuf>,
    profiles: RwLock<Profiles>,
    /// 保证快照按顺序落盘
    persist: Mutex<()>,
}

impl PreferenceStore {
    /// 不落盘的偏好存储
    pub fn in_memory() -> Self {
        Self { path: None, profiles: RwLock::new(HashMap::new()), persist: Mutex::new(()) }
    }

    /// 从文件加载偏好，文件不存在或损坏时从空数据开始
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let profiles = if path.exists() {
            match Self::read_snapshot(&path) {
                Ok(profiles) => {
                    info!("已加载 {} 个用户的偏好", profiles.len());
                    profiles
                }
                Err(e) => {
                    error!("加载偏好失败 {}: {e}", path.display());
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        let profiles = profiles.into_iter().map(|(k, v)| (k, Arc::new(Mutex::new(v)))).collect();
        Self { path: Some(path), profiles: RwLock::new(profiles), persist: Mutex::new(()) }
    }

    pub fn read_snapshot(path: &Path) -> Result<BTreeMap<String, UserPreferenceProfile>> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 用户数量
    pub fn len(&self) -> usize {
        self.profiles.read().map(|p| p.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 喜欢一张图片，返回偏好是否发生变化
    pub fn like(&self, wallet: &str, image_id: &str) -> Result<bool> {
        let profile = self.get_or_create(wallet)?;
        let changed = profile.lock().map_err(|_| Error::LockPoisoned)?.liked_images.insert(image_id.to_owned());
        if changed {
            self.persist();
        }
        Ok(changed)
    }

    /// 取消喜欢一张图片，未知钱包不会创建记录
    pub fn unlike(&self, wallet: &str, image_id: &str) -> Result<bool> {
        let Some(profile) = self.get(wallet)? else {
            return Ok(false);
        };
        let changed = profile.lock().map_err(|_| Error::LockPoisoned)?.liked_images.remove(image_id);
        if changed {
            self.persist();
        }
        Ok(changed)
    }

    /// 用户喜欢的图片，未知钱包返回空集合
    pub fn likes(&self, wallet: &str) -> Result<BTreeSet<String>> {
        Ok(self.profile(wallet)?.map(|p| p.liked_images).unwrap_or_default())
    }

    pub fn profile(&self, wallet: &str) -> Result<Option<UserPreferenceProfile>> {
        match self.get(wallet)? {
            Some(profile) => Ok(Some(profile.lock().map_err(|_| Error::LockPoisoned)?.clone())),
            None => Ok(None),
        }
    }

    /// 将完整快照原子地写入文件：先写临时文件，再重命名覆盖
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.persist.lock().map_err(|_| Error::LockPoisoned)?;
        let snapshot = self.snapshot()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &snapshot)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            error!("保存偏好失败: {e}");
        }
    }

    fn snapshot(&self) -> Result<BTreeMap<String, UserPreferenceProfile>> {
        let profiles = self.profiles.read().map_err(|_| Error::LockPoisoned)?;
        profiles
            .iter()
            .map(|(wallet, profile)| {
                let profile = profile.lock().map_err(|_| Error::LockPoisoned)?;
                Ok((wallet.clone(), profile.clone()))
            })
            .collect()
    }

    fn get(&self, wallet: &str) -> Result<Option<Arc<Mutex<UserPreferenceProfile>>>> {
        let profiles = self.profiles.read().map_err(|_| Error::LockPoisoned)?;
        Ok(profiles.get(wallet).cloned())
    }

    fn get_or_create(&self, wallet: &str) -> Result<Arc<Mutex<UserPreferenceProfile>>> {
        if let Some(profile) = self.get(wallet)? {
            return Ok(profile);
        }
        let mut profiles = self.profiles.write().map_err(|_| Error::LockPoisoned)?;
        let profile = profiles.entry(wallet.to_owned()).or_insert_with(|| {
            info!("创建用户偏好: {wallet}");
            Arc::new(Mutex::new(UserPreferenceProfile::new()))
        });
        Ok(profile.clone())
    }
}

/// 计算用户喜欢的图片向量的平均值
///
/// 无法在存储中找到的图片会被跳过，全部找不到时返回 None。结果不做归一化。
pub fn aggregate<'a>(
    store: &EmbeddingStore,
    liked: impl IntoIterator<Item = &'a String>,
) -> Option<Vec<f32>> {
    let mut sum = vec![0.0f32; store.dim()];
    let mut count = 0;
    for id in liked {
        let Ok((_, v)) = store.find_by_id(id).and_then(|p| store.get(p)) else {
            warn!("跳过不存在的图片: {id}");
            continue;
        };
        sum.iter_mut().zip(v).for_each(|(a, b)| *a += b);
        count += 1;
    }
    if count == 0 {
        return None;
    }
    sum.iter_mut().for_each(|x| *x /= count as f32);
    Some(sum)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use tempfile::TempDir;

    use super::*;
    use crate::store::ImageRecord;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_like_unlike_roundtrip() {
        let prefs = PreferenceStore::in_memory();
        prefs.like("w", "a").unwrap();
        let before = prefs.likes("w").unwrap();

        assert!(prefs.like("w", "b").unwrap());
        assert!(prefs.unlike("w", "b").unwrap());
        assert_eq!(prefs.likes("w").unwrap(), before);
    }

    #[test]
    fn test_like_twice() {
        let prefs = PreferenceStore::in_memory();
        assert!(prefs.like("w", "a").unwrap());
        assert!(!prefs.like("w", "a").unwrap());
        assert_eq!(prefs.likes("w").unwrap(), set(&["a"]));
    }

    #[test]
    fn test_unknown_wallet() {
        let prefs = PreferenceStore::in_memory();
        assert!(prefs.likes("nobody").unwrap().is_empty());
        assert!(!prefs.unlike("nobody", "a").unwrap());
        assert!(prefs.is_empty());
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs").join("preferences.json");

        let prefs = PreferenceStore::open(&path);
        prefs.like("w1", "a").unwrap();
        prefs.like("w1", "b").unwrap();
        prefs.like("w2", "c").unwrap();
        prefs.unlike("w1", "a").unwrap();
        let created_at = prefs.profile("w1").unwrap().unwrap().created_at;

        let reloaded = PreferenceStore::open(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.likes("w1").unwrap(), set(&["b"]));
        assert_eq!(reloaded.likes("w2").unwrap(), set(&["c"]));
        assert_eq!(reloaded.profile("w1").unwrap().unwrap().created_at, created_at);
        assert!(!dir.path().join("prefs").join("preferences.json.tmp").exists());
    }

    #[test]
    fn test_load_legacy_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(
            &path,
            r#"{"0xabc": {"liked_images": ["cat", "dog", "cat"], "created_at": "2024-05-01T10:20:30.123456"}}"#,
        )
        .unwrap();

        let prefs = PreferenceStore::open(&path);
        assert_eq!(prefs.likes("0xabc").unwrap(), set(&["cat", "dog"]));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, "not json").unwrap();

        let prefs = PreferenceStore::open(&path);
        assert!(prefs.is_empty());
        prefs.like("w", "a").unwrap();
        assert_eq!(PreferenceStore::open(&path).likes("w").unwrap(), set(&["a"]));
    }

    #[test]
    fn test_write_failure_keeps_memory() {
        let dir = TempDir::new().unwrap();
        // 目标路径是一个目录，重命名必然失败
        let path = dir.path().join("preferences.json");
        fs::create_dir(&path).unwrap();

        let prefs = PreferenceStore::open(&path);
        assert!(prefs.like("w", "a").unwrap());
        assert_eq!(prefs.likes("w").unwrap(), set(&["a"]));
    }

    #[test]
    fn test_concurrent_likes_same_wallet() {
        let prefs = PreferenceStore::in_memory();
        thread::scope(|s| {
            for t in 0..8 {
                let prefs = &prefs;
                s.spawn(move || {
                    for i in 0..50 {
                        prefs.like("w", &format!("{t}-{i}")).unwrap();
                    }
                });
            }
        });
        assert_eq!(prefs.likes("w").unwrap().len(), 400);
    }

    #[test]
    fn test_aggregate() {
        let mut store = EmbeddingStore::new(2);
        store.insert(ImageRecord::from_path("a.jpg").unwrap(), vec![1.0, 0.0]).unwrap();
        store.insert(ImageRecord::from_path("b.jpg").unwrap(), vec![0.0, 1.0]).unwrap();

        assert_eq!(aggregate(&store, &set(&[])), None);
        assert_eq!(aggregate(&store, &set(&["x"])), None);
        assert_eq!(aggregate(&store, &set(&["a", "x"])), Some(vec![1.0, 0.0]));
        // 平均值不做归一化
        assert_eq!(aggregate(&store, &set(&["a", "b"])), Some(vec![0.5, 0.5]));
    }
}
