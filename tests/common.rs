/// Builder for big-endian font table data in tests.
///
/// Child tables written with `offset16`/`offset32` are laid out after the table, in the order
/// they were added, and the offsets are patched to point at them relative to the start of this
/// table.
#[derive(Clone, Debug, Default)]
pub struct Table {
    data: Vec<u8>,
    children: Vec<(usize, OffsetSize, Table)>,
}

#[derive(Copy, Clone, Debug)]
enum OffsetSize {
    Offset16,
    Offset32,
}

#[allow(dead_code)]
impl Table {
    pub fn new() -> Self {
        Table::default()
    }

    pub fn u16(mut self, value: u16) -> Self {
        self.data.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i16(mut self, value: i16) -> Self {
        self.data.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn u32(mut self, value: u32) -> Self {
        self.data.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn tag(self, tag: &[u8; 4]) -> Self {
        self.u32(u32::from_be_bytes(*tag))
    }

    pub fn u16s(self, values: &[u16]) -> Self {
        values.iter().fold(self, |table, &value| table.u16(value))
    }

    /// A 16-bit offset to `child`.
    pub fn offset16(mut self, child: Table) -> Self {
        self.children
            .push((self.data.len(), OffsetSize::Offset16, child));
        self.u16(0)
    }

    /// A 32-bit offset to `child`.
    pub fn offset32(mut self, child: Table) -> Self {
        self.children
            .push((self.data.len(), OffsetSize::Offset32, child));
        self.u32(0)
    }

    /// A 16-bit null offset.
    pub fn null16(self) -> Self {
        self.u16(0)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        for (position, size, child) in &self.children {
            let offset = data.len();
            match size {
                OffsetSize::Offset16 => {
                    let offset = u16::try_from(offset).expect("offset exceeds 16 bits");
                    data[*position..*position + 2].copy_from_slice(&offset.to_be_bytes());
                }
                OffsetSize::Offset32 => {
                    let offset = u32::try_from(offset).expect("offset exceeds 32 bits");
                    data[*position..*position + 4].copy_from_slice(&offset.to_be_bytes());
                }
            }
            data.extend_from_slice(&child.to_bytes());
        }
        data
    }
}
