use macroquad::math::Vec2;
use serde::{Deserialize, Serialize};
use shared::RoomKind;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

use super::cell::{CellType, Zone};
use super::terrain::Terrain;
use super::{MAX_ROOM_RADIUS, MIN_ROOM_SCORE, ROOM_SEARCH_SLACK};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomType {
    Home,
    Nursery,
    FoodStorage,
    Barracks,
}

impl RoomType {
    pub const ALL: [RoomType; 4] = [
        RoomType::Home,
        RoomType::Nursery,
        RoomType::FoodStorage,
        RoomType::Barracks,
    ];

    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index as usize).min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn zone(self) -> Zone {
        match self {
            RoomType::Home => Zone::QueenChamber,
            RoomType::Nursery => Zone::Nursery,
            RoomType::FoodStorage => Zone::FoodStorage,
            RoomType::Barracks => Zone::Barracks,
        }
    }

    pub fn kind(self) -> RoomKind {
        match self {
            RoomType::Home => RoomKind::Home,
            RoomType::Nursery => RoomKind::Nursery,
            RoomType::FoodStorage => RoomKind::FoodStorage,
            RoomType::Barracks => RoomKind::Barracks,
        }
    }

    pub fn from_kind(kind: RoomKind) -> Self {
        match kind {
            RoomKind::Home => RoomType::Home,
            RoomKind::Nursery => RoomType::Nursery,
            RoomKind::FoodStorage => RoomType::FoodStorage,
            RoomKind::Barracks => RoomType::Barracks,
        }
    }

    pub fn default_radius(self) -> f32 {
        match self {
            RoomType::Home => 4.0,
            RoomType::Nursery => 3.0,
            RoomType::FoodStorage => 3.0,
            RoomType::Barracks => 3.5,
        }
    }
}

/// A persistent chamber carved into the terrain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: u32,
    pub room_type: RoomType,
    pub colony_id: u8,
    pub center: (i32, i32),
    pub radius: f32,
    pub capacity: u32,
    pub occupancy: u32,
    pub over_capacity: bool,
}

impl Room {
    pub fn new(room_type: RoomType, colony_id: u8, center: (i32, i32), radius: f32) -> Self {
        let radius = radius.clamp(1.0, MAX_ROOM_RADIUS);
        Self {
            id: 0,
            room_type,
            colony_id,
            center,
            radius,
            capacity: Self::capacity_for(radius),
            occupancy: 0,
            over_capacity: false,
        }
    }

    pub fn capacity_for(radius: f32) -> u32 {
        ((std::f32::consts::PI * radius * radius * 0.5).round() as u32).max(1)
    }

    pub fn center_pos(&self) -> Vec2 {
        Vec2::new(self.center.0 as f32 + 0.5, self.center.1 as f32 + 0.5)
    }

    pub fn contains(&self, pos: Vec2) -> bool {
        pos.distance_squared(self.center_pos()) <= self.radius * self.radius
    }

    /// Whether a circle at `center` with `radius` would intrude on this room,
    /// leaving at least one cell of wall between the two.
    pub fn overlaps(&self, center: (i32, i32), radius: f32) -> bool {
        let dx = (self.center.0 - center.0) as f32;
        let dy = (self.center.1 - center.1) as f32;
        (dx * dx + dy * dy).sqrt() < self.radius + radius + 1.0
    }

    pub fn cells(&self) -> Vec<(i32, i32)> {
        circle_cells(self.center, self.radius)
    }
}

/// Cells whose centers lie within `radius` of the center of `center`.
pub fn circle_cells(center: (i32, i32), radius: f32) -> Vec<(i32, i32)> {
    let r = radius.ceil() as i32;
    let r_sq = radius * radius;
    let mut cells = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if (dx * dx + dy * dy) as f32 <= r_sq {
                cells.push((center.0 + dx, center.1 + dy));
            }
        }
    }
    cells
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkAction {
    Dig,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkCell {
    pub x: i32,
    pub y: i32,
    pub action: WorkAction,
}

impl WorkCell {
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x as f32 + 0.5, self.y as f32 + 0.5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildKind {
    Room(RoomType),
    Reinforce,
    EmergencyDefense,
    Blueprint,
}

/// A pending construction request owned by one colony.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildTask {
    pub id: u64,
    pub colony_id: u8,
    pub kind: BuildKind,
    pub target: (i32, i32),
    pub radius: f32,
    /// Explicit cells for wall and blueprint work. Empty for rooms.
    pub cells: Vec<(i32, i32)>,
    pub assigned: Option<u64>,
}

impl BuildTask {
    /// Expands the task into the concrete cell work still outstanding,
    /// nearest to `from` first.
    pub fn work_cells(&self, terrain: &Terrain, from: (i32, i32)) -> VecDeque<WorkCell> {
        let mut work: Vec<WorkCell> = match self.kind {
            BuildKind::Room(_) => circle_cells(self.target, self.radius)
                .into_iter()
                .filter(|&(x, y)| terrain.cell_type_at(x, y) == Some(CellType::Dirt))
                .map(|(x, y)| WorkCell { x, y, action: WorkAction::Dig })
                .collect(),
            BuildKind::Reinforce | BuildKind::EmergencyDefense => self
                .cells
                .iter()
                .filter(|&&(x, y)| terrain.cell_type_at(x, y) == Some(CellType::Air))
                .map(|&(x, y)| WorkCell { x, y, action: WorkAction::Fill })
                .collect(),
            BuildKind::Blueprint => self
                .cells
                .iter()
                .filter(|&&(x, y)| terrain.cell_type_at(x, y) == Some(CellType::Dirt))
                .map(|&(x, y)| WorkCell { x, y, action: WorkAction::Dig })
                .collect(),
        };
        work.sort_by_key(|c| {
            let dx = c.x - from.0;
            let dy = c.y - from.1;
            (dx * dx + dy * dy, c.y, c.x)
        });
        work.into()
    }
}

/// FIFO queue of construction tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildQueue {
    tasks: VecDeque<BuildTask>,
    next_id: u64,
}

impl BuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        colony_id: u8,
        kind: BuildKind,
        target: (i32, i32),
        radius: f32,
        cells: Vec<(i32, i32)>,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.tasks.push_back(BuildTask {
            id,
            colony_id,
            kind,
            target,
            radius,
            cells,
            assigned: None,
        });
        debug!(task_id = id, colony_id, ?kind, "build task queued");
        id
    }

    pub fn get(&self, id: u64) -> Option<&BuildTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn remove(&mut self, id: u64) -> Option<BuildTask> {
        let pos = self.tasks.iter().position(|t| t.id == id)?;
        self.tasks.remove(pos)
    }

    pub fn has_pending(&self, colony_id: u8, kind: BuildKind) -> bool {
        self.tasks
            .iter()
            .any(|t| t.colony_id == colony_id && t.kind == kind)
    }

    /// Drops every task of a colony, returning how many were removed.
    pub fn drop_colony(&mut self, colony_id: u8) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.colony_id != colony_id);
        before - self.tasks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildTask> {
        self.tasks.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BuildTask> {
        self.tasks.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn from_parts(tasks: Vec<BuildTask>, next_id: u64) -> Self {
        let max_id = tasks.iter().map(|t| t.id).max().unwrap_or(0);
        Self {
            tasks: tasks.into(),
            next_id: next_id.max(max_id),
        }
    }
}

impl Terrain {
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn room(&self, id: u32) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    pub fn room_of_type(&self, colony_id: u8, room_type: RoomType) -> Option<&Room> {
        self.rooms
            .iter()
            .find(|r| r.colony_id == colony_id && r.room_type == room_type)
    }

    pub fn home_room(&self, colony_id: u8) -> Option<&Room> {
        self.room_of_type(colony_id, RoomType::Home)
    }

    /// Registers a room and carves it: dirt inside the circle becomes air and
    /// every non-rock cell is zoned. Returns `None` without touching the
    /// terrain when the room is out of bounds, would be a second home, or
    /// overlaps another room of the same colony.
    pub fn add_room(&mut self, mut room: Room) -> Option<u32> {
        let (cx, cy) = room.center;
        if !self.in_bounds(cx, cy) || !(room.radius >= 1.0) {
            return None;
        }
        if room.room_type == RoomType::Home && self.home_room(room.colony_id).is_some() {
            return None;
        }
        if self
            .rooms
            .iter()
            .any(|r| r.colony_id == room.colony_id && r.overlaps(room.center, room.radius))
        {
            return None;
        }

        let zone = room.room_type.zone();
        for (x, y) in room.cells() {
            match self.cell_type_at(x, y) {
                Some(CellType::Rock) | None => continue,
                Some(CellType::Dirt) => {
                    self.set_cell(x, y, CellType::Air, None);
                }
                Some(_) => {}
            }
            if let Some(idx) = self.index(x, y) {
                self.zone[idx] = zone;
            }
        }

        self.next_room_id += 1;
        room.id = self.next_room_id;
        room.capacity = Room::capacity_for(room.radius);
        let id = room.id;
        debug!(room_id = id, colony_id = room.colony_id, room_type = ?room.room_type, "room added");
        self.rooms.push(room);
        Some(id)
    }

    /// Removes all rooms of a colony, downgrading their zones to general tunnels.
    pub fn remove_rooms_of(&mut self, colony_id: u8) -> usize {
        let (removed, kept): (Vec<Room>, Vec<Room>) = std::mem::take(&mut self.rooms)
            .into_iter()
            .partition(|r| r.colony_id == colony_id);
        self.rooms = kept;
        for room in &removed {
            for (x, y) in room.cells() {
                if let Some(idx) = self.index(x, y) {
                    if self.zone[idx] == room.room_type.zone() {
                        self.zone[idx] = Zone::General;
                    }
                }
            }
        }
        removed.len()
    }

    pub(crate) fn rooms_mut(&mut self) -> &mut [Room] {
        &mut self.rooms
    }

    /// Fraction of the circle's cells that are in bounds and diggable or open.
    pub fn diggable_fraction(&self, center: (i32, i32), radius: f32) -> f32 {
        let cells = circle_cells(center, radius);
        if cells.is_empty() {
            return 0.0;
        }
        let good = cells
            .iter()
            .filter(|&&(x, y)| {
                matches!(self.cell_type_at(x, y), Some(CellType::Dirt | CellType::Air))
            })
            .count();
        good as f32 / cells.len() as f32
    }

    /// Searches outward from an anchor room for the best spot for a new room
    /// of `radius`, scoring candidate circles by diggable area and rejecting
    /// any that overlap an existing room or leave the map.
    pub fn find_new_room_location(
        &self,
        colony_id: u8,
        anchor_room_id: u32,
        radius: f32,
    ) -> Option<(i32, i32)> {
        let anchor = self
            .rooms
            .iter()
            .find(|r| r.id == anchor_room_id && r.colony_id == colony_id)?;
        let radius = radius.clamp(1.0, MAX_ROOM_RADIUS);
        let min_dist = anchor.radius + radius + 1.0;
        let max_dist = min_dist + ROOM_SEARCH_SLACK;
        let margin = radius.ceil() as i32 + 1;

        let mut visited: HashSet<(i32, i32)> = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(anchor.center);
        queue.push_back(anchor.center);

        let mut best: Option<((i32, i32), f32)> = None;
        while let Some((x, y)) = queue.pop_front() {
            let dx = (x - anchor.center.0) as f32;
            let dy = (y - anchor.center.1) as f32;
            let dist = (dx * dx + dy * dy).sqrt();

            if dist >= min_dist
                && x >= margin
                && y >= margin
                && x < self.width as i32 - margin
                && y < self.height as i32 - margin
                && !self.rooms.iter().any(|r| r.overlaps((x, y), radius))
            {
                let score = self.diggable_fraction((x, y), radius);
                if score >= MIN_ROOM_SCORE && best.is_none_or(|(_, s)| score > s) {
                    best = Some(((x, y), score));
                    if score >= 0.98 {
                        break;
                    }
                }
            }

            for (nx, ny) in [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)] {
                if !self.in_bounds(nx, ny) || visited.contains(&(nx, ny)) {
                    continue;
                }
                let ndx = (nx - anchor.center.0) as f32;
                let ndy = (ny - anchor.center.1) as f32;
                if (ndx * ndx + ndy * ndy).sqrt() > max_dist {
                    continue;
                }
                visited.insert((nx, ny));
                queue.push_back((nx, ny));
            }
        }
        best.map(|(pos, _)| pos)
    }
}
