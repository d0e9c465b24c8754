use crate::common::{PageId, PAGE_SIZE};

const MAGIC: u32 = 0x4152_4248; // "ARBH"

const MAGIC_OFFSET: usize = 0;
const RECORD_COUNT_OFFSET: usize = 4;
const RECORDS_OFFSET: usize = 8;

const NAME_SIZE: usize = 32;
const RECORD_SIZE: usize = NAME_SIZE + 4; // name + root page id

/// Maximum number of index records the header page can hold
pub const MAX_HEADER_RECORDS: usize = (PAGE_SIZE - RECORDS_OFFSET) / RECORD_SIZE;

/// The well-known page (id 0) mapping index names to root page ids.
///
/// Each record is a fixed-width NUL-padded name followed by the root page
/// id of that index. An index registers itself once with `insert_record`
/// and rewrites its entry with `update_record` whenever the root moves.
pub struct HeaderPage<'a> {
    data: &'a mut [u8],
}

impl<'a> HeaderPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self) {
        self.data.fill(0);
        self.data[MAGIC_OFFSET..MAGIC_OFFSET + 4].copy_from_slice(&MAGIC.to_le_bytes());
        self.set_record_count(0);
    }

    pub fn is_valid(&self) -> bool {
        header_is_valid(self.data)
    }

    pub fn record_count(&self) -> usize {
        record_count(self.data)
    }

    fn set_record_count(&mut self, count: usize) {
        self.data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4]
            .copy_from_slice(&(count as u32).to_le_bytes());
    }

    /// Registers a new index. Fails if the name is already present, too
    /// long, or the page is out of record slots.
    pub fn insert_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        if name.len() > NAME_SIZE || self.record_count() == MAX_HEADER_RECORDS {
            return false;
        }
        if find_record(self.data, name).is_some() {
            return false;
        }
        let index = self.record_count();
        self.write_record(index, name, root_page_id);
        self.set_record_count(index + 1);
        true
    }

    /// Rewrites the root page id of an existing index. Fails if the name
    /// is not registered.
    pub fn update_record(&mut self, name: &str, root_page_id: PageId) -> bool {
        match find_record(self.data, name) {
            Some(index) => {
                self.write_record(index, name, root_page_id);
                true
            }
            None => false,
        }
    }

    /// Drops an index record, compacting the tail. Fails if the name is
    /// not registered.
    pub fn delete_record(&mut self, name: &str) -> bool {
        let Some(index) = find_record(self.data, name) else {
            return false;
        };
        let count = self.record_count();
        for i in index + 1..count {
            let src = RECORDS_OFFSET + i * RECORD_SIZE;
            let dst = RECORDS_OFFSET + (i - 1) * RECORD_SIZE;
            self.data.copy_within(src..src + RECORD_SIZE, dst);
        }
        self.set_record_count(count - 1);
        true
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        get_root_id(self.data, name)
    }

    fn write_record(&mut self, index: usize, name: &str, root_page_id: PageId) {
        let offset = RECORDS_OFFSET + index * RECORD_SIZE;
        self.data[offset..offset + NAME_SIZE].fill(0);
        self.data[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        self.data[offset + NAME_SIZE..offset + RECORD_SIZE]
            .copy_from_slice(&root_page_id.as_u32().to_le_bytes());
    }
}

/// Read-only view of the header page
pub struct HeaderPageRef<'a> {
    data: &'a [u8],
}

impl<'a> HeaderPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn is_valid(&self) -> bool {
        header_is_valid(self.data)
    }

    pub fn record_count(&self) -> usize {
        record_count(self.data)
    }

    pub fn get_root_id(&self, name: &str) -> Option<PageId> {
        get_root_id(self.data, name)
    }
}

fn header_is_valid(data: &[u8]) -> bool {
    let bytes: [u8; 4] = data[MAGIC_OFFSET..MAGIC_OFFSET + 4].try_into().unwrap();
    u32::from_le_bytes(bytes) == MAGIC
}

fn record_count(data: &[u8]) -> usize {
    let bytes: [u8; 4] = data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4]
        .try_into()
        .unwrap();
    u32::from_le_bytes(bytes) as usize
}

fn find_record(data: &[u8], name: &str) -> Option<usize> {
    if name.len() > NAME_SIZE {
        return None;
    }
    (0..record_count(data)).find(|&i| {
        let offset = RECORDS_OFFSET + i * RECORD_SIZE;
        let stored = &data[offset..offset + NAME_SIZE];
        let end = stored.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
        &stored[..end] == name.as_bytes()
    })
}

fn get_root_id(data: &[u8], name: &str) -> Option<PageId> {
    let index = find_record(data, name)?;
    let offset = RECORDS_OFFSET + index * RECORD_SIZE + NAME_SIZE;
    let bytes: [u8; 4] = data[offset..offset + 4].try_into().unwrap();
    Some(PageId::new(u32::from_le_bytes(bytes)))
}
