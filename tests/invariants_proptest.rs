//! Los estados derivados se mantienen tras cualquier secuencia de operaciones

mod support;

use geo::{LineString, MultiLineString};
use proptest::prelude::*;
use support::{near_node, node_lon, north, TestNetwork};
use transit_network::models::StopChanges;
use transit_network::services::LineChanges;

#[derive(Debug, Clone)]
enum Op {
    Associate { stop: usize, line: usize },
    SetAssociation { index: usize, enabled: bool },
    SetLine { line: usize, enabled: bool },
    MoveStop { stop: usize, node: usize, meters: f64 },
    DeleteAssociation { index: usize },
    DeleteStop { stop: usize },
    Reroute { line: usize, from: usize, to: usize, enabled: Option<bool> },
    DrawRoute { line: usize, from: usize, to: usize, meters: f64 },
    DeleteLine { line: usize },
}

/// Recorrido dibujado a mano entre dos nodos, desplazado `meters` al norte
fn drawn_route(from: usize, to: usize, meters: f64) -> MultiLineString<f64> {
    MultiLineString::new(vec![LineString::from(vec![
        (node_lon(from), north(meters)),
        (node_lon(to), north(meters)),
    ])])
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..5usize, 0..2usize).prop_map(|(stop, line)| Op::Associate { stop, line }),
        (0..8usize, any::<bool>()).prop_map(|(index, enabled)| Op::SetAssociation { index, enabled }),
        (0..2usize, any::<bool>()).prop_map(|(line, enabled)| Op::SetLine { line, enabled }),
        (0..5usize, 0..5usize, prop::sample::select(vec![10.0, 60.0, 95.0]))
            .prop_map(|(stop, node, meters)| Op::MoveStop { stop, node, meters }),
        (0..8usize).prop_map(|index| Op::DeleteAssociation { index }),
        (0..5usize).prop_map(|stop| Op::DeleteStop { stop }),
        (0..2usize, 0..5usize, 0..5usize, prop::option::of(any::<bool>()))
            .prop_map(|(line, from, to, enabled)| Op::Reroute { line, from, to, enabled }),
        (0..2usize, 0..5usize, 0..5usize, prop::sample::select(vec![0.0, 60.0, 160.0]))
            .prop_map(|(line, from, to, meters)| Op::DrawRoute { line, from, to, meters }),
        (0..2usize).prop_map(|line| Op::DeleteLine { line }),
    ]
}

async fn run(ops: Vec<Op>) {
    let net = TestNetwork::new();
    let mut stops = Vec::new();
    for (i, name) in ["Ciudadela", "Plaza Independencia", "Tres Cruces", "Paso Molino", "Cerro"].iter().enumerate() {
        stops.push(net.stop(name, i).await.id);
    }
    let lines = [net.line("121", &[0, 2]).await.line.id, net.line("185", &[2, 4]).await.line.id];
    net.assert_invariants().await;

    for op in ops {
        // Los rechazos son esperables; lo que importa es el estado resultante
        let _ = match op {
            Op::Associate { stop, line } => net
                .state
                .associations
                .associate(stops[stop], lines[line], &[])
                .await
                .map(|_| ()),
            Op::SetAssociation { index, enabled } => {
                let all = net.state.associations.list_associations().await.unwrap();
                match all.get(index) {
                    Some(detail) => net
                        .state
                        .associations
                        .set_association_enabled(detail.association.id, enabled)
                        .await
                        .map(|_| ()),
                    None => Ok(()),
                }
            }
            Op::SetLine { line, enabled } => net.state.lines.set_line_enabled(lines[line], enabled).await.map(|_| ()),
            Op::MoveStop { stop, node, meters } => net
                .state
                .stops
                .modify_stop(
                    stops[stop],
                    StopChanges {
                        location: Some(near_node(node, meters)),
                        ..StopChanges::default()
                    },
                )
                .await
                .map(|_| ()),
            Op::DeleteAssociation { index } => {
                let all = net.state.associations.list_associations().await.unwrap();
                match all.get(index) {
                    Some(detail) => net.state.associations.delete_association(detail.association.id).await,
                    None => Ok(()),
                }
            }
            Op::DeleteStop { stop } => net.state.stops.delete_stop(stops[stop]).await,
            Op::Reroute { line, from, to, enabled } => {
                let changes = LineChanges {
                    enabled,
                    waypoints: Some(vec![near_node(from, 30.0), near_node(to, 30.0)]),
                    ..LineChanges::default()
                };
                net.state.lines.modify_line(lines[line], changes).await.map(|_| ())
            }
            Op::DrawRoute { line, from, to, meters } => {
                let changes = LineChanges {
                    route: Some(drawn_route(from, to, meters)),
                    ..LineChanges::default()
                };
                net.state.lines.modify_line(lines[line], changes).await.map(|_| ())
            }
            Op::DeleteLine { line } => net.state.lines.delete_line(lines[line]).await,
        };
        net.assert_invariants().await;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn derived_states_hold_after_every_operation(ops in prop::collection::vec(op(), 1..16)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(run(ops));
    }
}
