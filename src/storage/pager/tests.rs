use super::*;
use tempfile::TempDir;

fn setup() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pager.db");
    (dir, path)
}

#[test]
fn test_open_empty_file() {
    let (_dir, path) = setup();
    let pager = Pager::open(&path, 31).unwrap();
    assert_eq!(pager.num_pages(), 0);
    assert_eq!(pager.file_pages(), 0);
    assert!(path.exists());
}

#[test]
fn test_write_and_reopen() {
    let (_dir, path) = setup();

    {
        let mut pager = Pager::open(&path, 31).unwrap();
        let first = pager.allocate_page().unwrap();
        let second = pager.allocate_page().unwrap();
        assert_eq!((first, second), (0, 1));

        pager.get_page(0).unwrap().write_u32(100, 0xdead_beef);
        pager.get_page(1).unwrap().write_u32(200, 7);
        pager.flush(0).unwrap();
        pager.flush(1).unwrap();
    }

    {
        let mut pager = Pager::open(&path, 31).unwrap();
        assert_eq!(pager.num_pages(), 2);
        assert_eq!(pager.get_page(0).unwrap().read_u32(100), 0xdead_beef);
        assert_eq!(pager.get_page(1).unwrap().read_u32(200), 7);
    }

    assert_eq!(std::fs::metadata(&path).unwrap().len(), 2 * PAGE_SIZE as u64);
}

#[test]
fn test_page_past_end_is_not_found() {
    let (_dir, path) = setup();
    let mut pager = Pager::open(&path, 31).unwrap();
    pager.allocate_page().unwrap();

    assert!(matches!(pager.get_page(20), Err(PageDbError::PageNotFound(20))));
    assert!(matches!(pager.get_page(1), Err(PageDbError::PageNotFound(1))));
    // A failed lookup must not reserve page numbers.
    assert_eq!(pager.num_pages(), 1);
    assert_eq!(pager.allocate_page().unwrap(), 1);
}

#[test]
fn test_failed_lookup_does_not_grow_file() {
    let (_dir, path) = setup();
    {
        let mut pager = Pager::open(&path, 31).unwrap();
        pager.allocate_page().unwrap();
        assert!(pager.get_page(20).is_err());
        pager.flush_all().unwrap();
    }
    assert_eq!(std::fs::metadata(&path).unwrap().len(), PAGE_SIZE as u64);
    let pager = Pager::open(&path, 31).unwrap();
    assert_eq!(pager.num_pages(), 1);
}

#[test]
fn test_allocated_page_is_zeroed() {
    let (_dir, path) = setup();
    let mut pager = Pager::open(&path, 31).unwrap();
    let n = pager.allocate_page().unwrap();
    assert!(pager.get_page(n).unwrap().as_bytes().iter().all(|&b| b == 0));
}

#[test]
fn test_capacity_ceiling() {
    let (_dir, path) = setup();
    let mut pager = Pager::open(&path, 2).unwrap();
    pager.allocate_page().unwrap();
    pager.allocate_page().unwrap();
    assert!(matches!(
        pager.allocate_page(),
        Err(PageDbError::CapacityExceeded { max_pages: 2 })
    ));
    assert!(matches!(pager.get_page(2), Err(PageDbError::PageNotFound(2))));
}

#[test]
fn test_flush_unmaterialized_page() {
    let (_dir, path) = setup();
    let mut pager = Pager::open(&path, 31).unwrap();
    assert!(matches!(pager.flush(5), Err(PageDbError::PageNotFound(5))));
}

#[test]
fn test_rejects_partial_page_file() {
    let (_dir, path) = setup();
    std::fs::write(&path, vec![0u8; PAGE_SIZE + 10]).unwrap();
    assert!(matches!(
        Pager::open(&path, 31),
        Err(PageDbError::FormatViolation(_))
    ));
}

#[test]
fn test_rejects_file_larger_than_ceiling() {
    let (_dir, path) = setup();
    std::fs::write(&path, vec![0u8; PAGE_SIZE * 3]).unwrap();
    assert!(matches!(
        Pager::open(&path, 2),
        Err(PageDbError::CapacityExceeded { max_pages: 2 })
    ));
}

#[test]
fn test_second_open_is_locked() {
    let (_dir, path) = setup();
    let _pager = Pager::open(&path, 31).unwrap();
    assert!(matches!(
        Pager::open(&path, 31),
        Err(PageDbError::Locked(_))
    ));
}

#[test]
fn test_flush_all() {
    let (_dir, path) = setup();
    {
        let mut pager = Pager::open(&path, 31).unwrap();
        for i in 0..3 {
            let n = pager.allocate_page().unwrap();
            pager.get_page(n).unwrap().write_u8(0, i as u8 + 1);
        }
        pager.flush_all().unwrap();
    }
    let mut pager = Pager::open(&path, 31).unwrap();
    assert_eq!(pager.num_pages(), 3);
    assert_eq!(pager.get_page(2).unwrap().read_u8(0), 3);
}
