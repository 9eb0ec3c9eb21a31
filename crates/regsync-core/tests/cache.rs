//! Tests for the register cache and raw blocks

use regsync_core::arch::i386::{self, regnum};
use regsync_core::error::RegSyncError;
use regsync_core::types::{RegisterIndex, StateClass};
use regsync_core::{RawBlock, RegisterCache};

#[test]
fn test_new_cache_is_empty_and_sized_per_register()
{
    let arch = i386::gnu();
    let cache = RegisterCache::for_arch(&arch);

    assert_eq!(cache.len(), arch.register_count());
    for index in arch.indices() {
        let (bytes, valid) = cache.read(index);
        assert!(!valid);
        assert!(!cache.is_fetched(index));
        assert_eq!(bytes.len(), arch.register_width(index));
    }
}

#[test]
fn test_supply_none_zeroes_and_invalidates()
{
    let arch = i386::gnu();
    let mut cache = RegisterCache::for_arch(&arch);

    cache.supply(regnum::ST0, Some(&[0xaa; 10]));
    assert!(cache.is_valid(regnum::ST0));

    cache.supply(regnum::ST0, None);
    let (bytes, valid) = cache.read(regnum::ST0);
    assert!(!valid);
    assert_eq!(bytes, &[0; 10]);
}

#[test]
fn test_set_checks_index_and_width()
{
    let arch = i386::gnu();
    let mut cache = RegisterCache::for_arch(&arch);

    cache.set(regnum::EAX, &[1, 2, 3, 4]).unwrap();
    assert_eq!(cache.read(regnum::EAX), (&[1, 2, 3, 4][..], true));
    assert!(!cache.is_fetched(regnum::EAX));

    assert!(matches!(
        cache.set(RegisterIndex(32), &[0; 4]),
        Err(RegSyncError::InvalidRegister { count: 32, .. })
    ));
    assert!(matches!(cache.set(regnum::ST7, &[0; 4]), Err(RegSyncError::InvalidArgument(_))));
}

#[test]
fn test_invalidate_all_clears_flags()
{
    let arch = i386::gnu();
    let mut cache = RegisterCache::for_arch(&arch);
    cache.supply(regnum::EIP, Some(&[0, 0x80, 0x04, 0x08]));
    cache.mark_fetched(regnum::EIP);

    cache.invalidate_all();

    assert!(!cache.is_valid(regnum::EIP));
    assert!(!cache.is_fetched(regnum::EIP));
}

#[test]
#[should_panic(expected = "bytes wide")]
fn test_supply_rejects_wrong_width()
{
    let arch = i386::gnu();
    let mut cache = RegisterCache::for_arch(&arch);
    cache.supply(regnum::EAX, Some(&[1, 2]));
}

#[test]
fn test_block_size_check()
{
    let block = RawBlock::zeroed(i386::THREAD_STATE_SIZE);
    assert!(block.clone().checked(StateClass::General, i386::THREAD_STATE_SIZE).is_ok());

    let err = block.checked(StateClass::General, 120).unwrap_err();
    assert!(matches!(
        err,
        RegSyncError::BlockSize {
            expected: 120,
            actual: 68,
            ..
        }
    ));
}

#[test]
fn test_block_fields_are_little_endian()
{
    let arch = i386::gnu();
    let mut block = RawBlock::zeroed(i386::THREAD_STATE_SIZE);
    let eip = arch.descriptor(regnum::EIP);

    block.set_field(eip, &0x0804_8000_u32.to_le_bytes());
    assert_eq!(block.read_u32(48), 0x0804_8000);
    assert_eq!(block.field(eip), &[0x00, 0x80, 0x04, 0x08]);
    assert!(block.as_bytes()[..48].iter().all(|&byte| byte == 0));
}
