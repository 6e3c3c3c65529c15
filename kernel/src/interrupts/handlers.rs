//! Interrupt Handlers
//! 
//! Individual handlers for CPU exceptions and hardware interrupts.

use x86_64::structures::idt::{InterruptStackFrame, PageFaultErrorCode};
use core::sync::atomic::{AtomicBool, Ordering};
use super::pic::{self, PICS};

/// Breakpoint exception handler
pub extern "x86-interrupt" fn breakpoint_handler(stack_frame: InterruptStackFrame) {
    crate::log_warn!("EXCEPTION: BREAKPOINT\n{:#?}", stack_frame);
}

/// Double fault handler (unrecoverable)
pub extern "x86-interrupt" fn double_fault_handler(
    stack_frame: InterruptStackFrame,
    _error_code: u64,
) -> ! {
    panic!("EXCEPTION: DOUBLE FAULT\n{:#?}", stack_frame);
}

/// Page fault handler
pub extern "x86-interrupt" fn page_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: PageFaultErrorCode,
) {
    use x86_64::registers::control::Cr2;
    
    let addr = Cr2::read();
    
    crate::log_error!(
        "EXCEPTION: PAGE FAULT\n\
        Accessed Address: {:?}\n\
        Error Code: {:?}\n\
        {:#?}",
        addr,
        error_code,
        stack_frame
    );
    
    // Record in trace
    crate::trace::record_event(crate::trace::EventType::PageFault, addr.as_u64());
    
    // For now, panic on page fault
    // TODO: Implement proper page fault handling
    panic!("Page fault at {:?}", addr);
}

/// General protection fault handler
pub extern "x86-interrupt" fn general_protection_fault_handler(
    stack_frame: InterruptStackFrame,
    error_code: u64,
) {
    panic!(
        "EXCEPTION: GENERAL PROTECTION FAULT\n\
        Error Code: {}\n\
        {:#?}",
        error_code, stack_frame
    );
}

/// Invalid opcode handler
pub extern "x86-interrupt" fn invalid_opcode_handler(stack_frame: InterruptStackFrame) {
    panic!("EXCEPTION: INVALID OPCODE\n{:#?}", stack_frame);
}

/// Divide by zero handler
pub extern "x86-interrupt" fn divide_error_handler(stack_frame: InterruptStackFrame) {
    panic!("EXCEPTION: DIVIDE BY ZERO\n{:#?}", stack_frame);
}

/// Timer interrupt handler
pub extern "x86-interrupt" fn timer_interrupt_handler(_stack_frame: InterruptStackFrame) {
    if !BOOTSTRAP_READY.load(Ordering::Relaxed) {
        unsafe {
            PICS.lock().notify_end_of_interrupt(pic::InterruptIndex::Timer.as_u8());
        }
        return;
    }
    // Update tick counter
    crate::logger::tick();
    crate::time::tick();

    // Record timer event
    crate::trace::record_event(crate::trace::EventType::TimerTick, 0);

    // Send EOI
    unsafe {
        PICS.lock().notify_end_of_interrupt(pic::InterruptIndex::Timer.as_u8());
    }
}

/// PS/2 port 1 interrupt — drained and discarded. No cell owns the host's
/// keyboard controller; a root-cell PCI device can claim real input.
pub extern "x86-interrupt" fn keyboard_interrupt_handler(_stack_frame: InterruptStackFrame) {
    use x86_64::instructions::port::Port;
    let mut port = Port::<u8>::new(0x60);
    unsafe { let _: u8 = port.read(); }
    unsafe {
        PICS.lock().notify_end_of_interrupt(pic::InterruptIndex::Keyboard.as_u8());
    }
}

static BOOTSTRAP_READY: AtomicBool = AtomicBool::new(false);

pub fn set_bootstrap_ready(ready: bool) {
    BOOTSTRAP_READY.store(ready, Ordering::SeqCst);
}

/// IRQ12 — drained and discarded, same reasoning as the keyboard handler.
pub extern "x86-interrupt" fn mouse_interrupt_handler(_stack_frame: InterruptStackFrame) {
    unsafe {
        PICS.lock().notify_end_of_interrupt(pic::InterruptIndex::Mouse.as_u8());
    }
}
