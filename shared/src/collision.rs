//! Collision detection between moving gatherers and stationary items.
//!
//! A gatherer is a circle swept along a straight segment during one tick;
//! an item is a stationary circle. The engine enumerates every
//! gatherer/item contact as a [`GatheringEvent`] in chronological order.
//! Items remain in place after being touched: a qualifying pair always
//! yields an event even if another gatherer reached the item earlier.
//! Deciding which events are consumed (pickup, delivery, bag limits) is
//! the simulation's responsibility, not the engine's.

use crate::Position;

/// Stationary circle that can be gathered.
#[derive(Debug, Clone, Copy)]
pub struct Item {
    pub position: Position,
    pub width: f64,
}

/// Circle swept from `start` to `end` during one tick.
#[derive(Debug, Clone, Copy)]
pub struct Gatherer {
    pub start: Position,
    pub end: Position,
    pub width: f64,
}

/// One gatherer/item contact.
///
/// `time` is the relative moment of closest approach within the tick,
/// in `[0, 1]`; `sq_distance` is the squared distance at that moment
/// (kept squared to avoid needless square roots).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatheringEvent {
    pub gatherer_id: usize,
    pub item_id: usize,
    pub sq_distance: f64,
    pub time: f64,
}

/// Capability the engine consumes: indexed access to items and gatherers.
///
/// Realized over plain slices by [`SliceProvider`]; the generic bound
/// keeps dispatch static in the per-pair hot loop.
pub trait ItemGathererProvider {
    fn items_count(&self) -> usize;
    fn item(&self, index: usize) -> Item;
    fn gatherers_count(&self) -> usize;
    fn gatherer(&self, index: usize) -> Gatherer;
}

/// Provider over borrowed item and gatherer slices.
pub struct SliceProvider<'a> {
    items: &'a [Item],
    gatherers: &'a [Gatherer],
}

impl<'a> SliceProvider<'a> {
    pub fn new(items: &'a [Item], gatherers: &'a [Gatherer]) -> Self {
        Self { items, gatherers }
    }
}

impl ItemGathererProvider for SliceProvider<'_> {
    fn items_count(&self) -> usize {
        self.items.len()
    }

    fn item(&self, index: usize) -> Item {
        self.items[index]
    }

    fn gatherers_count(&self) -> usize {
        self.gatherers.len()
    }

    fn gatherer(&self, index: usize) -> Gatherer {
        self.gatherers[index]
    }
}

/// Enumerates all gather events, sorted by ascending event time.
///
/// For each pair the item is projected onto the gatherer's movement
/// segment; the projection ratio is clamped to `[0, 1]`, and the pair
/// produces an event when the squared distance from the item to the
/// clamped foot point is within the squared sum of both radii. A
/// gatherer that did not move produces no events. The sort is stable, so
/// simultaneous events keep provider order.
pub fn find_gather_events<P: ItemGathererProvider>(provider: &P) -> Vec<GatheringEvent> {
    let mut events = Vec::new();
    for gatherer_id in 0..provider.gatherers_count() {
        let gatherer = provider.gatherer(gatherer_id);
        let dx = gatherer.end.x - gatherer.start.x;
        let dy = gatherer.end.y - gatherer.start.y;
        let length_sq = dx * dx + dy * dy;
        if length_sq == 0.0 {
            continue;
        }
        for item_id in 0..provider.items_count() {
            let item = provider.item(item_id);
            let dot = (item.position.x - gatherer.start.x) * dx
                + (item.position.y - gatherer.start.y) * dy;
            let time = (dot / length_sq).clamp(0.0, 1.0);
            let foot_x = gatherer.start.x + time * dx;
            let foot_y = gatherer.start.y + time * dy;
            let sq_distance =
                (item.position.x - foot_x).powi(2) + (item.position.y - foot_y).powi(2);
            let reach = item.width + gatherer.width;
            if sq_distance <= reach * reach {
                events.push(GatheringEvent {
                    gatherer_id,
                    item_id,
                    sq_distance,
                    time,
                });
            }
        }
    }
    events.sort_by(|left, right| left.time.total_cmp(&right.time));
    events
}
