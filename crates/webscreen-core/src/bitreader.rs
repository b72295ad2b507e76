//! 比特流读取器.
//!
//! 按大端位序 (MSB first) 从字节缓冲区中读取数据, 并提供 Exp-Golomb 解码,
//! 供 SPS 解析使用.
//!
//! 与通用解码器使用的读取器不同, 这里的读取是宽松的: 越界读取不会报错也不会 panic,
//! 而是返回 0 并记录越界状态. SPS 经常被截断, 解析器在关键字段之后统一检查
//! [`BitReader::is_overrun`] 来判定输入是否完整.

/// Exp-Golomb 前导零计数上限
const MAX_LEADING_ZEROS: u32 = 32;

/// 比特流读取器
///
/// # 示例
/// ```
/// use webscreen_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4), 0b1011);
/// assert_eq!(br.read_bits(4), 0b0001);
/// assert_eq!(br.read_bits(8), 0b01010101);
/// assert!(!br.is_overrun());
/// ```
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最高位)
    bit_pos: u8,
    /// 是否发生过越界读取或损坏的 Exp-Golomb 码
    overrun: bool,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
            overrun: false,
        }
    }

    /// 获取已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.bits_left() == 0
    }

    /// 是否发生过越界读取
    pub fn is_overrun(&self) -> bool {
        self.overrun
    }

    /// 读取 1 个位, 越界返回 0
    pub fn read_bit(&mut self) -> u32 {
        if self.byte_pos >= self.data.len() {
            self.overrun = true;
            return 0;
        }

        let bit = (self.data[self.byte_pos] >> (7 - self.bit_pos)) & 1;
        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        u32::from(bit)
    }

    /// 读取 N 个位 (0..=32)
    ///
    /// 按大端位序读取, 返回值的低 N 位有效. 越界部分按 0 补齐.
    /// `n > 32` 视为损坏输入, 返回 0.
    pub fn read_bits(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        if n > 32 {
            self.overrun = true;
            return 0;
        }

        let mut result: u32 = 0;
        let mut remaining = n;

        while remaining > 0 {
            if self.byte_pos >= self.data.len() {
                // 剩余位全部补 0
                self.overrun = true;
                result = if remaining >= 32 { 0 } else { result << remaining };
                break;
            }

            let available = 8 - self.bit_pos as u32;
            let to_read = remaining.min(available);

            // 从当前字节中提取位
            let shift = available - to_read;
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> shift) & mask;

            result = (result << to_read) | u32::from(bits);

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            remaining -= to_read;
        }

        result
    }

    /// 读取一个布尔标志位
    pub fn read_flag(&mut self) -> bool {
        self.read_bit() == 1
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) {
        let total_bits = self.bits_read() + n as usize;
        if total_bits > self.data.len() * 8 {
            self.overrun = true;
            self.byte_pos = self.data.len();
            self.bit_pos = 0;
            return;
        }
        self.byte_pos = total_bits / 8;
        self.bit_pos = (total_bits % 8) as u8;
    }

    /// 读取无符号 Exp-Golomb 编码值 ue(v)
    ///
    /// 前导零计数上限为 32, 防止损坏输入导致死循环. 超出 `u32` 表示范围时
    /// 返回 `u32::MAX` 并标记越界.
    pub fn read_ue(&mut self) -> u32 {
        let mut leading_zeros = 0u32;
        while self.read_bit() == 0 {
            if self.overrun {
                return 0;
            }
            leading_zeros += 1;
            if leading_zeros >= MAX_LEADING_ZEROS {
                self.overrun = true;
                return u32::MAX;
            }
        }

        if leading_zeros == 0 {
            return 0;
        }

        let suffix = self.read_bits(leading_zeros);
        let value = (1u64 << leading_zeros) - 1 + u64::from(suffix);
        u32::try_from(value).unwrap_or(u32::MAX)
    }

    /// 读取有符号 Exp-Golomb 编码值 se(v)
    ///
    /// 映射: 0→0, 1→1, 2→-1, 3→2, 4→-2, ...
    pub fn read_se(&mut self) -> i32 {
        let code = self.read_ue();
        let value = code.div_ceil(2) as i32;
        if code & 1 == 0 { -value } else { value }
    }

    /// 获取当前字节位置
    pub fn byte_position(&self) -> usize {
        self.byte_pos
    }
}
