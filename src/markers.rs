//! Calendar markers: the dots and highlights shown on each day of the calendar
//!
//! The marker map is always derived from scratch from the task collection, the selected day and today's date.
//! Nothing ever edits it by hand.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use csscolorparser::Color;
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::watch;

use crate::task::{Task, Urgency};
use crate::theme::rgb;

pub type MarkerMap = BTreeMap<NaiveDate, Marker>;

static COMPLETED_DOT: Lazy<Color> = Lazy::new(|| rgb(0x28, 0xa7, 0x45));
static LOW_URGENCY_DOT: Lazy<Color> = Lazy::new(|| rgb(0x17, 0xa2, 0xb8));
static MEDIUM_URGENCY_DOT: Lazy<Color> = Lazy::new(|| rgb(0xff, 0xc1, 0x07));
static HIGH_URGENCY_DOT: Lazy<Color> = Lazy::new(|| rgb(0xdc, 0x35, 0x45));

static TODAY_BACKGROUND: Lazy<Color> = Lazy::new(|| rgb(0xcf, 0xe2, 0xff));
/// How much darker the selection is than the plain "today" background, when both apply to the same day
const TODAY_SELECTION_SHADE: f64 = 0.25;

/// The visual annotation of one calendar day.
///
/// It serializes the way calendar widgets expect their `markedDates` entries.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub selected: bool,
    pub marked: bool,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "hex::optional")]
    pub dot_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "hex::optional")]
    pub selected_color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_styles: Option<CustomStyles>,
    /// Whether this is the "current day" entry
    #[serde(skip)]
    pub current_day: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CustomStyles {
    pub container: ContainerStyle,
    pub text: TextStyle,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStyle {
    #[serde(serialize_with = "hex::required")]
    pub background_color: Color,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    #[serde(serialize_with = "hex::required")]
    pub color: Color,
    pub font_weight: &'static str,
}

mod hex {
    use csscolorparser::Color;
    use serde::Serializer;

    pub fn required<S: Serializer>(color: &Color, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&color.to_hex_string())
    }

    pub fn optional<S: Serializer>(color: &Option<Color>, serializer: S) -> Result<S::Ok, S::Error> {
        match color {
            Some(c) => serializer.serialize_str(&c.to_hex_string()),
            None => serializer.serialize_none(),
        }
    }
}

/// The dot shown for a task: its status wins when it is completed, otherwise its urgency decides
pub fn dot_color(task: &Task) -> Color {
    if task.completed() {
        return COMPLETED_DOT.clone();
    }
    match task.urgency() {
        Urgency::Low => LOW_URGENCY_DOT.clone(),
        Urgency::Medium => MEDIUM_URGENCY_DOT.clone(),
        Urgency::High => HIGH_URGENCY_DOT.clone(),
    }
}

fn darker(color: &Color, amount: f64) -> Color {
    let keep = 1.0 - amount;
    Color::from_rgba(color.r * keep, color.g * keep, color.b * keep, color.a)
}

fn current_day_style(accent: &Color) -> CustomStyles {
    CustomStyles {
        container: ContainerStyle { background_color: TODAY_BACKGROUND.clone() },
        text: TextStyle { color: accent.clone(), font_weight: "bold" },
    }
}

/// Compute the marker of every day that needs one.
///
/// This is a pure function: the same inputs always give the same map.
pub fn derive_markers(tasks: &[Task], selected: NaiveDate, today: NaiveDate, accent: &Color) -> MarkerMap {
    let mut markers = MarkerMap::new();

    markers.insert(today, Marker {
        custom_styles: Some(current_day_style(accent)),
        current_day: true,
        ..Marker::default()
    });

    // When several tasks share a day, the last one decides the dot color
    for task in tasks {
        let marker = markers.entry(task.date()).or_default();
        marker.marked = true;
        marker.dot_color = Some(dot_color(task));
    }

    let selected_marker = markers.entry(selected).or_default();
    selected_marker.selected = true;
    selected_marker.selected_color = if selected == today {
        Some(darker(&TODAY_BACKGROUND, TODAY_SELECTION_SHADE))
    } else {
        Some(accent.clone())
    };

    markers
}


/// Keeps the marker map of a calendar up to date, and publishes it to whoever subscribed
#[derive(Debug)]
pub struct CalendarView {
    selected: NaiveDate,
    today: NaiveDate,
    accent: Color,

    markers: watch::Sender<MarkerMap>,
}

impl CalendarView {
    /// Create a view where `today` is selected
    pub fn new(today: NaiveDate, accent: Color) -> Self {
        let (markers, _) = watch::channel(derive_markers(&[], today, today, &accent));
        Self { selected: today, today, accent, markers }
    }

    pub fn selected(&self) -> NaiveDate { self.selected }
    pub fn today(&self) -> NaiveDate    { self.today    }
    pub fn accent(&self) -> &Color      { &self.accent  }

    pub fn subscribe(&self) -> watch::Receiver<MarkerMap> {
        self.markers.subscribe()
    }

    /// The latest marker map
    pub fn markers(&self) -> MarkerMap {
        self.markers.borrow().clone()
    }

    /// Rebuild the marker map and notify subscribers
    pub fn refresh(&self, tasks: &[Task]) {
        let markers = derive_markers(tasks, self.selected, self.today, &self.accent);
        self.markers.send_replace(markers);
    }

    pub fn select(&mut self, date: NaiveDate, tasks: &[Task]) {
        self.selected = date;
        self.refresh(tasks);
    }

    /// To be called when the day changes while the app is running
    pub fn set_today(&mut self, today: NaiveDate, tasks: &[Task]) {
        if self.today != today {
            self.today = today;
            self.refresh(tasks);
        }
    }

    pub fn set_accent(&mut self, accent: Color, tasks: &[Task]) {
        self.accent = accent;
        self.refresh(tasks);
    }
}
