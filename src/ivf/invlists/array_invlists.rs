use super::InvertedLists;

/// 完全保存在内存中的倒排表
#[derive(Debug, Clone)]
pub struct ArrayInvertedLists {
    dim: usize,
    codes: Vec<Vec<f32>>,
    ids: Vec<Vec<u64>>,
}

impl ArrayInvertedLists {
    pub fn new(nlist: usize, dim: usize) -> Self {
        Self { dim, codes: vec![vec![]; nlist], ids: vec![vec![]; nlist] }
    }
}

impl InvertedLists for ArrayInvertedLists {
    fn nlist(&self) -> usize {
        self.ids.len()
    }

    fn code_size(&self) -> usize {
        self.dim
    }

    fn list_len(&self, list_no: usize) -> usize {
        self.ids[list_no].len()
    }

    fn get_list(&self, list_no: usize) -> (&[u64], &[f32]) {
        (&self.ids[list_no], &self.codes[list_no])
    }

    fn add_entries(&mut self, list_no: usize, ids: &[u64], codes: &[f32]) -> u64 {
        assert_eq!(ids.len() * self.dim, codes.len(), "ids and codes length mismatch");
        self.ids[list_no].extend_from_slice(ids);
        self.codes[list_no].extend_from_slice(codes);
        ids.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> ArrayInvertedLists {
        let mut invlists = ArrayInvertedLists::new(3, 2);
        invlists.add_entries(0, &[1, 2], &[0.1, 0.2, 0.3, 0.4]);
        invlists.add_entries(1, &[3, 4], &[0.5, 0.6, 0.7, 0.8]);
        invlists.add_entries(2, &[5], &[0.9, 1.0]);
        invlists
    }

    #[test]
    fn test_creation() {
        let invlists = ArrayInvertedLists::new(5, 4);
        assert_eq!(invlists.nlist(), 5);
        assert_eq!(invlists.code_size(), 4);
        assert!((0..5).all(|i| invlists.list_len(i) == 0));
    }

    #[test]
    fn test_get_list() {
        let invlists = populated();
        let (ids, codes) = invlists.get_list(1);
        assert_eq!(ids, &[3, 4]);
        assert_eq!(codes, &[0.5, 0.6, 0.7, 0.8]);
        assert_eq!(invlists.ntotal(), 5);
    }

    #[test]
    fn test_imbalance() {
        // 列表长度为 [2, 2, 1]
        // imbalance = (2² + 2² + 1²) * 3 / (2 + 2 + 1)² = 9 * 3 / 25 = 1.08
        assert!((populated().imbalance() - 1.08).abs() < 0.01);
    }

    #[test]
    #[should_panic(expected = "ids and codes length mismatch")]
    fn test_add_entries_mismatch() {
        let mut invlists = ArrayInvertedLists::new(2, 2);
        invlists.add_entries(0, &[1, 2, 3], &[0.0; 4]);
    }
}
