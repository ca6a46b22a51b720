//! Performance benchmarks for a3s-room
//!
//! Run with: cargo bench

use a3s_room::{
    ConnectionState, EngineState, MemoryEngine, ParticipantInfo, ParticipantStatus,
    ReconnectMode, Room, RoomOptions, SpeakerInfo, UserPacket,
};
use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

fn participants(count: usize) -> Vec<ParticipantInfo> {
    (0..count)
        .map(|i| ParticipantInfo {
            sid: format!("PA_{}", i).into(),
            identity: format!("user-{}", i).into(),
            name: String::new(),
            state: ParticipantStatus::Active,
            tracks: Vec::new(),
        })
        .collect()
}

fn connected_room(count: usize) -> Room {
    let engine = Arc::new(MemoryEngine::new());
    engine.set_state(EngineState::new(ConnectionState::Connected, ReconnectMode::None));
    let room = Room::new(engine, "me", RoomOptions::default()).unwrap();
    room.on_participant_update(&participants(count));
    room
}

fn bench_speakers_updated(c: &mut Criterion) {
    let mut group = c.benchmark_group("speakers_updated");
    for count in [10usize, 100, 1000] {
        let room = connected_room(count);
        let speakers: Vec<SpeakerInfo> = (0..count.min(5))
            .map(|i| SpeakerInfo::new(format!("PA_{}", i), 0.5))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &speakers, |b, speakers| {
            b.iter(|| room.on_speakers_updated(speakers));
        });
    }
    group.finish();
}

fn bench_participant_update(c: &mut Criterion) {
    let updates = participants(100);

    c.bench_function("participant_update 100 known", |b| {
        let room = connected_room(100);
        b.iter(|| room.on_participant_update(&updates));
    });
}

fn bench_user_packet(c: &mut Criterion) {
    let room = connected_room(100);
    let packet = UserPacket {
        participant_identity: "user-42".into(),
        payload: Bytes::from_static(b"{\"type\":\"chat\"}"),
        topic: Some("chat".to_string()),
    };

    c.bench_function("user_packet", |b| {
        b.iter(|| room.on_user_packet(packet.clone()));
    });
}

fn bench_state_mutated(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let room = connected_room(100);
    let connected = EngineState::new(ConnectionState::Connected, ReconnectMode::None);

    c.bench_function("state_mutated unchanged", |b| {
        b.to_async(&rt)
            .iter(|| room.on_state_mutated(connected.clone(), connected.clone()));
    });
}

criterion_group!(
    benches,
    bench_speakers_updated,
    bench_participant_update,
    bench_user_packet,
    bench_state_mutated
);
criterion_main!(benches);
