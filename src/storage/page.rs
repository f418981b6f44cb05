/// Raw page buffer (4096 bytes).
///
/// A page carries no header of its own; the B-tree node codec interprets
/// the bytes. Pages are identified by a dense 0-based page number and live
/// at byte offset `page_num * PAGE_SIZE` in the backing file.

pub const PAGE_SIZE: usize = 4096;

pub type PageNum = u32;

#[derive(Clone)]
pub struct Page {
    pub data: [u8; PAGE_SIZE],
}

impl Page {
    /// A zeroed page.
    pub fn new() -> Self {
        Page {
            data: [0u8; PAGE_SIZE],
        }
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.data[offset..offset + 4].try_into().unwrap())
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn read_u64(&self, offset: usize) -> u64 {
        u64::from_le_bytes(self.data[offset..offset + 8].try_into().unwrap())
    }

    pub fn write_u64(&mut self, offset: usize, value: u64) {
        self.data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }

    /// Get the raw page bytes.
    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("node_type", &self.data[0])
            .field("is_root", &self.data[1])
            .field("count", &self.read_u32(6))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_page_is_zeroed() {
        let page = Page::new();
        assert!(page.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_integer_accessors_are_little_endian() {
        let mut page = Page::new();
        page.write_u32(6, 0x0102_0304);
        assert_eq!(&page.data[6..10], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(page.read_u32(6), 0x0102_0304);

        page.write_u64(10, 42);
        assert_eq!(page.read_u64(10), 42);
        assert_eq!(page.data[10], 42);
    }
}
