use criterion::{criterion_group, criterion_main, Criterion};
use kaal_bootstrap::{replay_all, Increments, Invocation, StreamBuf, StreamBuilder};
use sel4_platform::{Badge, CPtr, InvocationLabel, Kernel, MessageInfo, Word};
use std::hint::black_box;

/// Kernel that accepts every invocation without recording it
struct NullKernel {
    mrs: [Word; 120],
}

impl Kernel for NullKernel {
    fn call(&mut self, _dest: CPtr, _info: MessageInfo) -> MessageInfo {
        MessageInfo::default()
    }

    fn recv(&mut self, _src: CPtr, _reply: CPtr) -> (MessageInfo, Badge) {
        unreachable!("replay never receives")
    }

    fn reply_recv(&mut self, _src: CPtr, _info: MessageInfo, _reply: CPtr) -> (MessageInfo, Badge) {
        unreachable!("replay never receives")
    }

    fn nb_send_recv(
        &mut self,
        _dest: CPtr,
        _info: MessageInfo,
        _src: CPtr,
        _reply: CPtr,
    ) -> (MessageInfo, Badge) {
        unreachable!("replay never receives")
    }

    fn nb_send(&mut self, _dest: CPtr, _info: MessageInfo) {}

    fn signal(&mut self, _dest: CPtr) {}

    fn mr(&self, index: usize) -> Word {
        self.mrs[index]
    }

    fn set_mr(&mut self, index: usize, value: Word) {
        self.mrs[index] = value;
    }

    fn set_cap(&mut self, _index: usize, _cap: CPtr) {}

    fn halt(&mut self) -> ! {
        panic!("halted")
    }
}

fn make_system_stream() -> StreamBuf {
    let mut builder = StreamBuilder::new();
    for pd in 0..64 {
        builder
            .push(Invocation::new(InvocationLabel::UntypedRetype, 1).mrs(&[1, 12, 0, 0, 10 + pd, 1]))
            .expect("retype");
    }
    builder
        .push(
            Invocation::new(InvocationLabel::CnodeMint, 200)
                .caps(&[10])
                .mrs(&[0x1000, 0])
                .repeat(
                    512,
                    Increments {
                        service: 0,
                        caps: vec![1],
                        mrs: vec![0x1000, 0],
                    },
                ),
        )
        .expect("mint");
    builder.finish()
}

fn bench_replay(c: &mut Criterion) {
    let stream = make_system_stream();
    c.bench_function("replay_system_stream", |b| {
        b.iter(|| {
            let mut kernel = NullKernel { mrs: [0; 120] };
            replay_all(&mut kernel, black_box(&stream.stream())).expect("replay");
        });
    });
}

criterion_group!(benches, bench_replay);
criterion_main!(benches);
