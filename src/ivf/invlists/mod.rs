mod array_invlists;

pub use array_invlists::*;

use crate::kmeans::imbalance_factor;

/// 倒排表，每个列表保存落在同一聚类中心下的向量位置和向量数据
pub trait InvertedLists {
    /// 返回倒排表的列表数量
    fn nlist(&self) -> usize;

    /// 单个向量的维数
    fn code_size(&self) -> usize;

    /// 返回指定倒排表的元素数量
    fn list_len(&self, list_no: usize) -> usize;

    /// 返回指定倒排表中向量的 ID 列表和展平的向量数据
    fn get_list(&self, list_no: usize) -> (&[u64], &[f32]);

    /// 往指定倒排表中批量添加元素，返回添加的数量
    fn add_entries(&mut self, list_no: usize, ids: &[u64], codes: &[f32]) -> u64;

    /// 所有列表的元素总数
    fn ntotal(&self) -> usize {
        (0..self.nlist()).map(|i| self.list_len(i)).sum()
    }

    /// 计算不平衡度
    fn imbalance(&self) -> f32 {
        let mut hist = Vec::with_capacity(self.nlist());
        for i in 0..self.nlist() {
            hist.push(self.list_len(i));
        }
        imbalance_factor(&hist)
    }
}
