use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, bounded};
use log::{debug, error};
use ndarray::ArrayD;
use ndarray_npy::read_npy;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Error, Result};
use crate::utils;

/// 文本和图片的嵌入向量生成器，返回的向量必须是固定维数的单位向量
pub trait Encoder: Send + Sync {
    /// 输出向量的维数
    fn dim(&self) -> usize;

    fn encode_text(&self, text: &str) -> Result<Vec<f32>>;

    fn encode_image(&self, path: &Path) -> Result<Vec<f32>>;
}

/// 从图片旁的 `<文件名>.npy` 读取图片向量，文本则使用词哈希投影
///
/// 适用于向量由外部模型离线生成的部署方式
#[derive(Debug, Clone)]
pub struct SidecarEncoder {
    dim: usize,
}

impl SidecarEncoder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// 图片对应的向量文件路径
    pub fn sidecar(path: &Path) -> PathBuf {
        path.with_extension("npy")
    }

    /// 每个词对应一个由词哈希决定的随机方向
    fn token_vector(&self, token: &str) -> Vec<f32> {
        let mut rng = ChaCha8Rng::seed_from_u64(fnv1a(token.as_bytes()));
        (0..self.dim).map(|_| rng.random_range(-1.0..1.0)).collect()
    }
}

impl Encoder for SidecarEncoder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0; self.dim];
        let mut tokens = 0;
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let t = self.token_vector(&token.to_lowercase());
            v.iter_mut().zip(t).for_each(|(a, b)| *a += b);
            tokens += 1;
        }
        if tokens == 0 {
            // 只有标点或符号时把整段文本当作一个词
            let whole = text.trim();
            if whole.is_empty() {
                return Err(Error::encoder(text, "文本为空"));
            }
            v = self.token_vector(whole);
        }
        utils::normalize(&mut v)?;
        Ok(v)
    }

    fn encode_image(&self, path: &Path) -> Result<Vec<f32>> {
        let sidecar = Self::sidecar(path);
        let array: ArrayD<f32> = read_npy(&sidecar).map_err(|e| Error::encoder(path, e))?;
        // 兼容 (D,) 和 (1, D) 两种形状
        if array.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: array.len() });
        }
        let mut v = array.iter().copied().collect::<Vec<_>>();
        utils::normalize(&mut v).map_err(|e| Error::encoder(path, e))?;
        Ok(v)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

enum Job {
    Text(String, Sender<Result<Vec<f32>>>),
    Image(PathBuf, Sender<Result<Vec<f32>>>),
}

/// 将编码器放在一个专用线程上，所有调用通过队列串行执行
///
/// 用于不可重入或需要独占硬件的编码器
pub struct SerialEncoder {
    dim: usize,
    tx: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl SerialEncoder {
    pub fn new<E: Encoder + 'static>(encoder: E) -> Self {
        let dim = encoder.dim();
        let (tx, rx) = bounded::<Job>(num_cpus::get());
        let worker = thread::Builder::new()
            .name("encoder".to_string())
            .spawn(move || {
                debug!("编码线程启动");
                while let Ok(job) = rx.recv() {
                    // 调用方已放弃等待时发送会失败，忽略即可
                    let _ = match job {
                        Job::Text(text, reply) => reply.send(encoder.encode_text(&text)),
                        Job::Image(path, reply) => reply.send(encoder.encode_image(&path)),
                    };
                }
                debug!("编码线程退出");
            })
            .map_err(|e| error!("无法创建编码线程: {e}"))
            .ok();
        Self { dim, tx: Some(tx), worker }
    }

    fn submit(&self, job: impl FnOnce(Sender<Result<Vec<f32>>>) -> Job) -> Result<Vec<f32>> {
        let (reply, result) = bounded(1);
        let tx = self.tx.as_ref().filter(|_| self.worker.is_some());
        match tx.map(|tx| tx.send(job(reply))) {
            Some(Ok(())) => result
                .recv()
                .unwrap_or_else(|_| Err(Error::encoder("", "编码线程已退出"))),
            _ => Err(Error::encoder("", "编码线程不可用")),
        }
    }
}

impl Encoder for SerialEncoder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn encode_text(&self, text: &str) -> Result<Vec<f32>> {
        self.submit(|reply| Job::Text(text.to_owned(), reply))
    }

    fn encode_image(&self, path: &Path) -> Result<Vec<f32>> {
        self.submit(|reply| Job::Image(path.to_path_buf(), reply))
    }
}

impl Drop for SerialEncoder {
    fn drop(&mut self) {
        // 先关闭队列，工作线程收到断开后退出
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
