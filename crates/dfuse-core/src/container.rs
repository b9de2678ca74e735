use crate::{DfuSeError, decode, encode};

/// Flash base of most STM32 parts, where a raw binary is placed by default.
pub const DEFAULT_ADDRESS: u32 = 0x0800_0000;

/// STMicroelectronics
pub const DEFAULT_VENDOR_ID: u16 = 0x0483;

pub const DEFAULT_TARGET_NAME: &str = "ST...";

/// A contiguous blob of memory and the address it is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    address: u32,
    data: Vec<u8>,
}

impl Image {
    pub fn new(address: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            address,
            data: data.into(),
        }
    }

    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Exclusive end of the memory covered by this image.
    pub fn end_address(&self) -> u64 {
        self.address as u64 + self.data.len() as u64
    }
}

/// The images written through one USB alternate setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    alternate_setting: u8,
    named: bool,
    name: String,
    images: Vec<Image>,
}

impl Target {
    pub fn named(alternate_setting: u8, name: impl Into<String>, images: Vec<Image>) -> Self {
        Self {
            alternate_setting,
            named: true,
            name: name.into(),
            images,
        }
    }

    pub fn unnamed(alternate_setting: u8, images: Vec<Image>) -> Self {
        Self {
            alternate_setting,
            named: false,
            name: String::new(),
            images,
        }
    }

    /// Keeps `name` even when `named` is false, so a decoded target encodes
    /// back to the same bytes.
    pub fn with_name_field(
        alternate_setting: u8,
        named: bool,
        name: impl Into<String>,
        images: Vec<Image>,
    ) -> Self {
        Self {
            alternate_setting,
            named,
            name: name.into(),
            images,
        }
    }

    pub fn alternate_setting(&self) -> u8 {
        self.alternate_setting
    }

    pub fn is_named(&self) -> bool {
        self.named
    }

    /// The stored name field. Only meaningful when [`Target::is_named`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name if the target is flagged as named.
    pub fn display_name(&self) -> Option<&str> {
        self.named.then_some(self.name.as_str())
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }
}

/// An in-memory DfuSe file.
///
/// Sizes, counts and the checksum are not stored here; they are derived when
/// encoding. A container is not modified in place: the `with_*` methods
/// consume it and return the changed copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    device_version: u16,
    product_id: u16,
    vendor_id: u16,
    targets: Vec<Target>,
}

impl Container {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            device_version: 0,
            product_id: 0,
            vendor_id: DEFAULT_VENDOR_ID,
            targets,
        }
    }

    /// One named target holding `data` at `address`.
    pub fn from_binary(address: u32, data: impl Into<Vec<u8>>) -> Self {
        Self::new(vec![Target::named(
            0,
            DEFAULT_TARGET_NAME,
            vec![Image::new(address, data)],
        )])
    }

    pub fn with_device_version(self, device_version: u16) -> Self {
        Self {
            device_version,
            ..self
        }
    }

    pub fn with_product_id(self, product_id: u16) -> Self {
        Self { product_id, ..self }
    }

    pub fn with_vendor_id(self, vendor_id: u16) -> Self {
        Self { vendor_id, ..self }
    }

    pub fn device_version(&self) -> u16 {
        self.device_version
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn encode(&self) -> Result<Vec<u8>, DfuSeError> {
        encode::encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DfuSeError> {
        decode::decode(bytes)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
