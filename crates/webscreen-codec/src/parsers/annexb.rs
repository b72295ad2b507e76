//! Annex B 起始码扫描.
//!
//! scrcpy 输出的 H.264/H.265 码流总是使用 4 字节起始码 `00 00 00 01`.
//! 扫描结果是原始负载的零拷贝切片 (不含起始码).

use std::borrow::Cow;

use bytes::Bytes;

/// 4 字节起始码
pub const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// 在 `data` 中查找第一个 `00 00 00 01` 的位置
///
/// 先定位 `0x01` 再回看前 3 字节, 比逐字节比较窗口快得多.
pub fn find_start_code(data: &[u8]) -> Option<usize> {
    let mut from = 3;
    while from < data.len() {
        let offset = data[from..].iter().position(|&b| b == 0x01)?;
        let pos = from + offset;
        if data[pos - 3..pos] == [0, 0, 0] {
            return Some(pos - 3);
        }
        from = pos + 1;
    }
    None
}

/// Annex B NAL 迭代器
///
/// 每次产出一个非空 NAL 单元 (不含起始码), 与原负载共享内存.
/// 第一个起始码之前的数据 (若有) 按一个 NAL 单元处理.
pub struct AnnexBNals {
    payload: Bytes,
    cursor: usize,
}

impl AnnexBNals {
    /// 创建迭代器
    pub fn new(payload: Bytes) -> Self {
        let cursor = if payload.starts_with(&START_CODE) {
            START_CODE.len()
        } else {
            0
        };
        Self { payload, cursor }
    }
}

impl Iterator for AnnexBNals {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        while self.cursor < self.payload.len() {
            let start = self.cursor;
            let end = match find_start_code(&self.payload[start..]) {
                Some(offset) => {
                    self.cursor = start + offset + START_CODE.len();
                    start + offset
                }
                None => {
                    self.cursor = self.payload.len();
                    self.payload.len()
                }
            };
            if end > start {
                return Some(self.payload.slice(start..end));
            }
        }
        None
    }
}

/// 按起始码切分负载
pub fn split_annex_b(payload: Bytes) -> AnnexBNals {
    AnnexBNals::new(payload)
}

/// 移除防竞争字节: `00 00 03` → `00 00`
///
/// 不含防竞争字节时不分配内存.
pub fn remove_emulation_prevention(data: &[u8]) -> Cow<'_, [u8]> {
    if !data.windows(3).any(|w| w == [0, 0, 3]) {
        return Cow::Borrowed(data);
    }

    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 3 {
            out.push(0);
            out.push(0);
            i += 3;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    Cow::Owned(out)
}
