//! Binary layout of the mapping file.
//!
//! Four tables, each written as an `i32` count followed by that many records.
//! All numbers are little-endian.
//!
//! ```text
//! asset -> bundle      : (guid[16], local:i64) bundle[16]
//! asset -> offset      : (guid[16], local:i64) offset:u64
//! bundle -> deps       : bundle[16] count:u32 bundle[16] * count
//! bundle -> dependants : bundle[16] count:u32 bundle[16] * count
//! ```

use std::cmp;
use std::collections::HashMap;
use std::hash::Hash;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use uuid::Uuid;

use super::{AssetId, BundleId, DependencyMapping};
use crate::errors::*;

const MAX_PREALLOCATED: usize = 1024;

impl DependencyMapping {
    /// Deserializes a mapping from `file`.
    pub fn read_from(file: &mut dyn Read) -> Result<Self> {
        let assets = read_table(file, read_asset, read_bundle)?;
        let offsets = read_table(file, read_asset, |f| Ok(f.read_u64::<LittleEndian>()?))?;
        let dependencies = read_table(file, read_bundle, read_bundle_list)?;
        let dependants = read_table(file, read_bundle, read_bundle_list)?;

        Ok(DependencyMapping {
            assets,
            offsets,
            dependencies,
            dependants,
        })
    }

    /// Serializes this mapping into `file`. Records are sorted by key so the
    /// same mapping always produces the same bytes.
    pub fn write_to(&self, file: &mut dyn Write) -> Result<()> {
        write_table(file, &self.assets, write_asset, |f, &v| write_bundle(f, v))?;
        write_table(file, &self.offsets, write_asset, |f, &v| {
            Ok(f.write_u64::<LittleEndian>(v)?)
        })?;
        write_table(file, &self.dependencies, write_bundle_ref, write_bundle_list)?;
        write_table(file, &self.dependants, write_bundle_ref, write_bundle_list)?;
        Ok(())
    }
}

fn read_table<K, V, FK, FV>(
    file: &mut dyn Read,
    mut key: FK,
    mut value: FV,
) -> Result<HashMap<K, V>>
where
    K: Hash + Eq,
    FK: FnMut(&mut dyn Read) -> Result<K>,
    FV: FnMut(&mut dyn Read) -> Result<V>,
{
    let count = file.read_i32::<LittleEndian>()?;
    if count < 0 {
        return Err(Error::Malformed(format!("negative table length {}", count)));
    }

    // The count is untrusted until the records actually show up.
    let mut table = HashMap::with_capacity(cmp::min(count as usize, MAX_PREALLOCATED));
    for _ in 0..count {
        let k = key(&mut *file)?;
        let v = value(&mut *file)?;
        table.insert(k, v);
    }

    Ok(table)
}

fn write_table<K, V, FK, FV>(
    file: &mut dyn Write,
    table: &HashMap<K, V>,
    mut key: FK,
    mut value: FV,
) -> Result<()>
where
    K: Hash + Eq + Ord,
    FK: FnMut(&mut dyn Write, &K) -> Result<()>,
    FV: FnMut(&mut dyn Write, &V) -> Result<()>,
{
    let mut keys: Vec<&K> = table.keys().collect();
    keys.sort();

    file.write_i32::<LittleEndian>(keys.len() as i32)?;
    for k in keys {
        key(&mut *file, k)?;
        value(&mut *file, &table[k])?;
    }

    Ok(())
}

fn read_uuid(file: &mut dyn Read) -> Result<Uuid> {
    let mut bytes = [0; 16];
    file.read_exact(&mut bytes)?;
    Ok(Uuid::from_bytes(bytes))
}

fn read_asset(file: &mut dyn Read) -> Result<AssetId> {
    let guid = read_uuid(file)?;
    let local = file.read_i64::<LittleEndian>()?;
    Ok(AssetId::new(guid, local))
}

fn read_bundle(file: &mut dyn Read) -> Result<BundleId> {
    Ok(BundleId::new(read_uuid(file)?))
}

fn read_bundle_list(file: &mut dyn Read) -> Result<Vec<BundleId>> {
    let count = file.read_u32::<LittleEndian>()?;
    (0..count).map(|_| read_bundle(&mut *file)).collect()
}

fn write_asset(file: &mut dyn Write, asset: &AssetId) -> Result<()> {
    file.write_all(asset.guid.as_bytes())?;
    file.write_i64::<LittleEndian>(asset.local)?;
    Ok(())
}

fn write_bundle(file: &mut dyn Write, bundle: BundleId) -> Result<()> {
    file.write_all(bundle.0.as_bytes())?;
    Ok(())
}

fn write_bundle_ref(file: &mut dyn Write, bundle: &BundleId) -> Result<()> {
    write_bundle(file, *bundle)
}

fn write_bundle_list(file: &mut dyn Write, bundles: &Vec<BundleId>) -> Result<()> {
    file.write_u32::<LittleEndian>(bundles.len() as u32)?;
    for &v in bundles {
        write_bundle(file, v)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::super::MappingBuilder;
    use super::*;

    #[test]
    fn layout() {
        let bundle = BundleId::new(Uuid::from_u128(1));
        let asset = AssetId::new(Uuid::from_u128(2), -3);
        let mapping = MappingBuilder::new()
            .bundle(bundle, vec![BundleId::sentinel()])
            .asset(asset, bundle, 7)
            .build();

        let mut bytes = Vec::new();
        mapping.write_to(&mut bytes).unwrap();

        // 4 counts, one asset->bundle (24 + 16), one asset->offset (24 + 8),
        // one dependency list (16 + 4 + 16) and no dependants.
        assert_eq!(bytes.len(), 4 * 4 + 40 + 32 + 36);
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[20..28], &(-3i64).to_le_bytes());

        let v = DependencyMapping::read_from(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(v, mapping);
    }

    #[test]
    fn truncated() {
        let mut bytes = Vec::new();
        MappingBuilder::new()
            .bundle(BundleId::new(Uuid::from_u128(1)), vec![])
            .build()
            .write_to(&mut bytes)
            .unwrap();

        bytes.truncate(bytes.len() - 10);
        assert!(DependencyMapping::read_from(&mut Cursor::new(&bytes)).is_err());
    }

    #[test]
    fn negative_count() {
        let bytes = (-1i32).to_le_bytes();
        match DependencyMapping::read_from(&mut Cursor::new(&bytes[..])) {
            Err(Error::Malformed(_)) => {}
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn huge_count() {
        let bytes = ::std::i32::MAX.to_le_bytes();
        assert!(DependencyMapping::read_from(&mut Cursor::new(&bytes[..])).is_err());
    }
}
