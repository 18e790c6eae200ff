// SPDX-License-Identifier: MIT
use alloc::boxed::Box;

use rpi_kernel::dtb::{self, DeviceTree, Property, PropertyKind};
use rpi_kernel::sync::OnceCell;
use rpi_kernel::{cpu, error, exception, info, kprintln, time, warn};

use crate::{bsp, KERNEL_MEMORY};

/// The board's device tree, parsed once on the boot core.
static DEVICE_TREE: OnceCell<DeviceTree<'static>> = OnceCell::new();

/// Brings up the clock, the heap, the device tree and the frame pool, in that order.
///
/// # Safety
/// - Must run once, on the boot core, with the MMU off.
/// - `dtb` must be the blob address the firmware passed in `x0`.
pub unsafe fn kernel_init(dtb: *const u8) -> ! {
    exception::asynchronous::local_irq_mask();

    time::arch_time::init();
    time::time_manager().set_log_timer(time::arch_time::uptime_ms);

    if let Err(e) = KERNEL_MEMORY.init_heap(bsp::kernel_layout()) {
        panic!("Failed to open the kernel heap: {}", e);
    }

    // Parsing allocates the node index on the heap opened above.
    let tree = dtb::blob_from_raw(dtb).and_then(DeviceTree::parse);
    let tree = match tree {
        Ok(tree) => tree,
        Err(e) => panic!("Malformed device tree at {:p}: {}", dtb, e),
    };
    if DEVICE_TREE.set(tree).is_err() {
        panic!("Device tree parsed twice");
    }

    if let Err(e) = KERNEL_MEMORY.init(&DEVICE_TREE) {
        panic!("Failed to set up the page frame pool: {}", e);
    }

    kernel_main()
}

fn kernel_main() -> ! {
    let dt: &DeviceTree = &DEVICE_TREE;

    kprintln!(
        "rpi-kernel v{} on {}, built at {}",
        env!("CARGO_PKG_VERSION"),
        bsp::BOARD_NAME,
        include_str!(concat!(env!("OUT_DIR"), "/timestamp.txt"))
    );
    info!("CurrentEL: EL{}", cpu::current_el());
    info!("SP: {:#x}", cpu::stack_pointer());
    info!(
        "Device tree: {} bytes, version {}, {} nodes",
        dt.header().totalsize,
        dt.header().version,
        dt.node_count()
    );

    for path in ["/model", "/compatible", "/memory@0/reg", "/chosen/bootargs"] {
        find_and_dump(dt, path);
    }

    info!("Board model: {}", dt.board_model().unwrap_or("<unknown>"));
    match dt.board_revision() {
        Some(revision) => info!("Board revision: {:#x}", revision),
        None => warn!("Board revision: <unknown>"),
    }
    match dt.board_serial() {
        Some(serial) => info!("Board serial: {:#x}", serial),
        None => warn!("Board serial: <unknown>"),
    }
    match dt.device_mmio_address("uart0") {
        Some(addr) => info!("Uart address: {:#x}", addr),
        None => warn!("Uart address: no uart0 alias"),
    }

    let stats = KERNEL_MEMORY.stats();
    info!("Memory overhead: {:#x}", KERNEL_MEMORY.get_memory_overhead());
    info!(
        "Page frames: {} total, {} free",
        stats.total_frames, stats.free_frames
    );

    page_test();
    heap_test();

    info!("Entering infinite idle loop.");
    cpu::wait_forever()
}

fn page_test() {
    const DATA: &[u8] = b"Hello World!";

    let Some(mut page) = KERNEL_MEMORY.new_page() else {
        error!("Allocate Page: out of page frames");
        return;
    };
    info!("Allocate Page: {}", page.address());

    // Starts 6 bytes before the end of the page, so only "Hello " fits.
    info!("Page Write: {}", page.write(4090, DATA));

    let mut buffer = [0u8; 1024];
    let nb_read = page.read(4090, &mut buffer[..DATA.len()]);
    info!("Page Read: {}", nb_read);
    info!(
        "Read: {}",
        core::str::from_utf8(&buffer[..nb_read]).unwrap_or("<not utf-8>")
    );

    page.free();
}

fn heap_test() {
    const DATA: &[u8] = b"Hello Kernel Heap!";

    info!("Heap test start:");
    let heap_start = KERNEL_MEMORY.get_heap_end();
    info!("Current kernel end: {:#x}", heap_start);

    match KERNEL_MEMORY.change_heap_end(DATA.len()) {
        Ok(end) => {
            info!("New kernel end: {:#x}", end);

            // The bytes between the old and the new end now belong to us.
            let written =
                unsafe { core::slice::from_raw_parts_mut(heap_start as *mut u8, DATA.len()) };
            written.copy_from_slice(DATA);
            info!(
                "Written: {}",
                core::str::from_utf8(written).unwrap_or("<not utf-8>")
            );
        }
        Err(e) => error!("Heap growth failed: {}", e),
    }

    let mut x = Box::new(42);
    info!("x = {}", x);
    *x = 43;
    info!("x = {}", x);
}

fn find_and_dump(dt: &DeviceTree, path: &str) {
    match dt.find_property(path) {
        Some(p) => print_property(&p),
        None => error!("Unable to find property: {}", path),
    }
}

fn print_property(p: &Property) {
    match p.kind() {
        PropertyKind::String => {
            info!("DeviceTree property {} (size: {}) :", p.name(), p.len());
            for s in p.strings() {
                info!("  - '{}'", s);
            }
        }
        PropertyKind::CellArray => {
            info!("DeviceTree property {} (size: {}) :", p.name(), p.len());
            for (i, cell) in p.cells().enumerate() {
                info!("  - At {}: {:#x}", i, cell);
            }
        }
        PropertyKind::Opaque => {
            info!("DeviceTree property {} (size: {}) :", p.name(), p.len());
            for (i, byte) in p.data().iter().enumerate() {
                info!("  - At {}: {:#x}", i, byte);
            }
        }
    }
}
