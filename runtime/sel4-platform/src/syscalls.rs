//! Kernel syscall interface
//!
//! The microkernel is an opaque external system: KaaL reaches it only
//! through a synchronous call and a handful of receive variants. The
//! [`Kernel`] trait is that seam. The real seL4 backend implements it with
//! the syscall instructions and the thread's IPC buffer; `sel4-mock`
//! implements it on the host for tests.
//!
//! Message registers and extra capabilities are staged in (and read back
//! from) the IPC buffer, exactly as libsel4 does, so every method only takes
//! the message tag.

use crate::{Badge, CPtr, MessageInfo, Word};

/// Primitive seL4 syscalls used by the runtime
pub trait Kernel {
    /// `seL4_Call`: send on `dest` and block for the reply.
    ///
    /// For an object invocation the returned label is the seL4 error code.
    fn call(&mut self, dest: CPtr, info: MessageInfo) -> MessageInfo;

    /// `seL4_Recv`: block on `src` until a call, notification or fault
    /// arrives. A reply capability for calls and faults is deposited in
    /// `reply`.
    fn recv(&mut self, src: CPtr, reply: CPtr) -> (MessageInfo, Badge);

    /// `seL4_ReplyRecv`: reply through `reply`, then receive on `src`, as one
    /// syscall.
    fn reply_recv(&mut self, src: CPtr, info: MessageInfo, reply: CPtr) -> (MessageInfo, Badge);

    /// `seL4_NBSendRecv`: non-blocking send on `dest`, then receive on `src`,
    /// as one syscall.
    fn nb_send_recv(
        &mut self,
        dest: CPtr,
        info: MessageInfo,
        src: CPtr,
        reply: CPtr,
    ) -> (MessageInfo, Badge);

    /// `seL4_NBSend`
    fn nb_send(&mut self, dest: CPtr, info: MessageInfo);

    /// `seL4_Signal`
    fn signal(&mut self, dest: CPtr);

    /// Read message register `index` of the IPC buffer
    fn mr(&self, index: usize) -> Word;

    /// Write message register `index` of the IPC buffer
    fn set_mr(&mut self, index: usize, value: Word);

    /// Stage extra capability `index` for the next send
    fn set_cap(&mut self, index: usize, cap: CPtr);

    /// `seL4_DebugNameThread`. A no-op on kernels built without debug support.
    fn debug_name_thread(&mut self, _tcb: CPtr, _name: &str) {}

    /// Stop the calling thread for good. Used after a fatal error.
    fn halt(&mut self) -> !;
}

impl<K: Kernel + ?Sized> Kernel for &mut K {
    fn call(&mut self, dest: CPtr, info: MessageInfo) -> MessageInfo {
        (**self).call(dest, info)
    }

    fn recv(&mut self, src: CPtr, reply: CPtr) -> (MessageInfo, Badge) {
        (**self).recv(src, reply)
    }

    fn reply_recv(&mut self, src: CPtr, info: MessageInfo, reply: CPtr) -> (MessageInfo, Badge) {
        (**self).reply_recv(src, info, reply)
    }

    fn nb_send_recv(
        &mut self,
        dest: CPtr,
        info: MessageInfo,
        src: CPtr,
        reply: CPtr,
    ) -> (MessageInfo, Badge) {
        (**self).nb_send_recv(dest, info, src, reply)
    }

    fn nb_send(&mut self, dest: CPtr, info: MessageInfo) {
        (**self).nb_send(dest, info)
    }

    fn signal(&mut self, dest: CPtr) {
        (**self).signal(dest)
    }

    fn mr(&self, index: usize) -> Word {
        (**self).mr(index)
    }

    fn set_mr(&mut self, index: usize, value: Word) {
        (**self).set_mr(index, value)
    }

    fn set_cap(&mut self, index: usize, cap: CPtr) {
        (**self).set_cap(index, cap)
    }

    fn debug_name_thread(&mut self, tcb: CPtr, name: &str) {
        (**self).debug_name_thread(tcb, name)
    }

    fn halt(&mut self) -> ! {
        (**self).halt()
    }
}
