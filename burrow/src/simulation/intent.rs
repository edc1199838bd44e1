use super::ant::AntKey;

/// Structural changes requested by an ant during its update. They are applied
/// by the simulation after every ant has been updated, so the ant collection
/// never changes while it is being iterated.
///
/// Acting ants are referenced by key (valid for the whole tick); other ants by
/// their stable id since the reference may outlive the tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    LayEgg { queen: AntKey },
    Hatch { egg: AntKey },
    Mature { larva: AntKey },
    PickUpEgg { nurse: AntKey, egg: u64 },
    DropEgg { nurse: AntKey, egg: u64 },
    DeliverFood { ant: AntKey, amount: u32 },
    FeedAnt { nurse: AntKey, target: u64 },
    BuildComplete { builder: AntKey, task_id: u64 },
}
