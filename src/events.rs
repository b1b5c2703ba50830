//! Synchronous event bus decoupling systems from each other and from
//! external consumers (UI, renderer).
//!
//! The bus is an explicitly constructed instance owned by the `World`; tests
//! build isolated worlds without any cross-test leakage. Dispatch is
//! synchronous and in registration order, and events emitted while a
//! dispatch is in flight are delivered before the outer `emit` returns, so
//! an event cascade is fully visible within the same tick.

use glam::Vec2;
use serde::Serialize;

use crate::components::EnemyKind;
use crate::world::EntityId;

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameOverReason {
    PlayerDied,
}

/// Final player stats reported with `GameOver`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GameOverStats {
    pub level: u32,
    pub experience: u32,
    pub kills: u32,
}

/// Everything the simulation core announces to the outside world.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GameEvent {
    /// An attack request was made (resolved by the combat system the same
    /// tick; resolution may still fail the cooldown or range check).
    AttackRequested { attacker: EntityId, target: EntityId },
    /// Damage was applied to a target's health.
    DamageDealt {
        attacker: EntityId,
        target: EntityId,
        amount: f32,
    },
    /// An entity's health reached zero. Fires exactly once per entity.
    EntityDied { entity: EntityId, position: Vec2 },
    /// A dead entity carried an `Enemy` tag.
    EnemyKilled {
        entity: EntityId,
        kind: EnemyKind,
        experience_reward: u32,
    },
    /// The player gained experience (before any level-up is applied).
    ExperienceGained {
        amount: u32,
        current: u32,
        to_next: u32,
    },
    /// The player crossed an experience threshold.
    PlayerLevelUp { new_level: u32, stat_points: u32 },
    /// The player died.
    GameOver {
        reason: GameOverReason,
        stats: GameOverStats,
    },
    /// Two colliders overlapped this frame. Fires before any physical
    /// separation, so listeners must not assume the pair is apart yet.
    Collision {
        entity_a: EntityId,
        entity_b: EntityId,
        position: Vec2,
    },
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&GameEvent)>;

/// Synchronous pub/sub bus.
pub struct EventBus {
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
    /// Events waiting on the in-flight dispatch loop.
    queue: Vec<GameEvent>,
    dispatching: bool,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_listener: 0,
            queue: Vec::new(),
            dispatching: false,
        }
    }

    /// Register a listener. Listeners are invoked in registration order.
    pub fn subscribe(&mut self, listener: impl FnMut(&GameEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if the id was already gone.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Publish an event to every listener, synchronously.
    ///
    /// If a dispatch is already running further up the stack, the event is
    /// appended to the in-flight queue and delivered by that loop before the
    /// outer `emit` returns.
    pub fn emit(&mut self, event: GameEvent) {
        self.queue.push(event);
        if self.dispatching {
            return;
        }
        self.dispatching = true;
        let mut cursor = 0;
        while cursor < self.queue.len() {
            let event = self.queue[cursor].clone();
            for index in 0..self.listeners.len() {
                (self.listeners[index].1)(&event);
            }
            cursor += 1;
        }
        self.queue.clear();
        self.dispatching = false;
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::{Key, KeyData};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn test_entity(n: u64) -> EntityId {
        EntityId::from(KeyData::from_ffi(n | (1 << 32)))
    }

    #[test]
    fn listeners_receive_events_in_registration_order() {
        let mut bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let first = order.clone();
        bus.subscribe(move |_| first.borrow_mut().push("first"));
        let second = order.clone();
        bus.subscribe(move |_| second.borrow_mut().push("second"));

        bus.emit(GameEvent::PlayerLevelUp {
            new_level: 2,
            stat_points: 3,
        });

        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));

        let sink = count.clone();
        let id = bus.subscribe(move |_| *sink.borrow_mut() += 1);

        bus.emit(GameEvent::ExperienceGained {
            amount: 10,
            current: 10,
            to_next: 100,
        });
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(GameEvent::ExperienceGained {
            amount: 10,
            current: 20,
            to_next: 100,
        });

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn payloads_arrive_intact() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        let attacker = test_entity(1);
        let target = test_entity(2);
        bus.emit(GameEvent::DamageDealt {
            attacker,
            target,
            amount: 12.5,
        });

        assert_eq!(
            *seen.borrow(),
            vec![GameEvent::DamageDealt {
                attacker,
                target,
                amount: 12.5,
            }]
        );
        assert!(!attacker.is_null());
    }
}
