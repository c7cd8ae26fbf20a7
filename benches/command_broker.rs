//! Benchmarks for command broker matching and queue drain.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use codegraph::domain::models::{CommandFilters, CommandInput, CommandPriority};
use codegraph::services::command_broker::{CommandBroker, WaitOptions};
use codegraph::services::config::BrokerConfig;

fn priority_for(i: usize) -> CommandPriority {
    match i % 4 {
        0 => CommandPriority::Low,
        1 => CommandPriority::Medium,
        2 => CommandPriority::High,
        _ => CommandPriority::Urgent,
    }
}

fn bench_send_to_queue(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("send_command_enqueue_1000", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let broker = CommandBroker::new(BrokerConfig::default());
                for i in 0..1000 {
                    broker
                        .send_command(
                            CommandInput::new(format!("cmd-{i}"))
                                .with_priority(priority_for(i))
                                .with_task_type("TESTING"),
                        )
                        .await
                        .unwrap();
                }
                black_box(broker.get_pending_commands().len())
            })
        });
    });
}

fn bench_drain_by_priority(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("wait_drain_500_pending", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let broker = CommandBroker::new(BrokerConfig::default());
                for i in 0..500 {
                    broker
                        .send_command(
                            CommandInput::new(format!("cmd-{i}")).with_priority(priority_for(i)),
                        )
                        .await
                        .unwrap();
                }
                for _ in 0..500 {
                    let command = broker
                        .wait_for_command("bench", WaitOptions::default())
                        .await
                        .unwrap();
                    black_box(command.priority);
                }
            })
        });
    });
}

fn bench_filter_matching(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("send_scan_filtered_pending_1000", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let broker = CommandBroker::new(BrokerConfig::default());
                for i in 0..1000 {
                    broker
                        .send_command(
                            CommandInput::new(format!("cmd-{i}"))
                                .with_priority(priority_for(i))
                                .with_task_type(if i % 2 == 0 { "TESTING" } else { "DEPLOY" }),
                        )
                        .await
                        .unwrap();
                }
                let command = broker
                    .wait_for_command(
                        "bench",
                        WaitOptions {
                            timeout_ms: Some(1_000),
                            filters: CommandFilters {
                                task_types: Some(vec!["DEPLOY".into()]),
                                min_priority: Some(CommandPriority::High),
                                ..CommandFilters::default()
                            },
                        },
                    )
                    .await
                    .unwrap();
                black_box(command.id)
            })
        });
    });
}

criterion_group!(
    benches,
    bench_send_to_queue,
    bench_drain_by_priority,
    bench_filter_matching
);
criterion_main!(benches);
