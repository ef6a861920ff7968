use std::sync::Arc;

use chatlink::events::{ChatMessage, EventBus, Priority};
use chatlink::OnlineUser;
use chatlink_proto::{MessageSubject, PlayerStatusMessage, StatusValue};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use uuid::Uuid;

// Envelope codec cost and listener chain cost, measured apart from the game
// thread hop.

fn envelope_benchmark(c: &mut Criterion) {
    let subject = MessageSubject::new(Uuid::new_v4(), "Steve", "survival");
    let msg = PlayerStatusMessage::health_change(&subject, 20.0, 14.0, 20.0, "ENTITY_ATTACK");
    let raw = chatlink_proto::encode(&msg).unwrap();

    let mut group = c.benchmark_group("envelope");
    group.throughput(Throughput::Bytes(raw.len() as u64));

    group.bench_function("encode_health_change", |b| {
        b.iter(|| chatlink_proto::encode(&msg).unwrap())
    });

    group.bench_function("decode_health_change", |b| {
        b.iter(|| chatlink_proto::decode(&raw).unwrap())
    });

    group.bench_function("status_update_with_value", |b| {
        b.iter(|| {
            PlayerStatusMessage::status_update(&subject, "away", StatusValue::Bool(true), "afk")
        })
    });

    group.finish();
}

fn dispatch_benchmark(c: &mut Criterion) {
    let bus = EventBus::new();
    for priority in [Priority::Low, Priority::Normal, Priority::High] {
        bus.register::<ChatMessage, _>(priority, "noop", |ctx| {
            let _ = ctx.event().message().len();
            Ok(())
        });
    }
    bus.monitor::<ChatMessage, _>("audit", |_ev, _cancelled| Ok(()));
    let sender = Arc::new(OnlineUser::console("bench"));

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("chat_message_4_listeners", |b| {
        b.iter(|| bus.dispatch(ChatMessage::new(sender.clone(), "global", "hello world")))
    });

    group.finish();
}

criterion_group!(benches, envelope_benchmark, dispatch_benchmark);
criterion_main!(benches);
