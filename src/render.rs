use std::fmt::{self, Write};

use crate::{
    config::{BoardConfig, Theme, ViewMode},
    format::{format_arrival, format_clock},
    model::RouteType,
    session::BoardFrame,
};

pub const STOP_PLACEHOLDER: &str = "Остановка";
pub const EMPTY_BOARD: &str = "Нет ближайших рейсов";
pub const PROMO_TITLE: &str = "Цифровые решения регионов";
pub const PROMO_SUBTITLE: &str = "Решение для цифровой трансформации";
pub const QR_TARGET: &str = "https://crrintegro.ru/asyot";

/// Header colours (foreground, background) per resolved theme.
const DARK_HEADER: ((u8, u8, u8), (u8, u8, u8)) = ((241, 245, 249), (15, 23, 42));
const LIGHT_HEADER: ((u8, u8, u8), (u8, u8, u8)) = ((15, 23, 42), (248, 250, 252));

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Emit ANSI colour escapes: route markers and the themed header.
    pub ansi: bool,
    /// What `auto` resolves to.
    pub system_dark: bool,
}

/// `"{city}, {stop}"`, preferring what the snapshot says.
pub fn header(frame: &BoardFrame) -> String {
    let city = non_empty(frame.stop_city.as_deref()).unwrap_or(&frame.identity.city);
    let name = non_empty(frame.stop_name.as_deref()).unwrap_or(STOP_PLACEHOLDER);
    format!("{}, {}", city, name)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

fn marker(route_type: RouteType, options: RenderOptions) -> String {
    if !options.ansi {
        return "●".to_string();
    }
    let (r, g, b) = route_type.color();
    format!("\x1b[38;2;{};{};{}m●\x1b[0m", r, g, b)
}

fn write_board(out: &mut impl Write, frame: &BoardFrame, options: RenderOptions) -> fmt::Result {
    writeln!(out, "{:<32} {}", "Маршрут", "Прибудет через")?;
    if frame.items.is_empty() {
        return writeln!(out, "{}", EMPTY_BOARD);
    }
    for projected in &frame.items {
        let item = &projected.item;
        let route = format!("{} {}", item.route_id, item.display_name());
        writeln!(
            out,
            "{} {:<30} {}",
            marker(item.route_type, options),
            route,
            format_arrival(projected.eta_seconds)
        )?;
    }
    Ok(())
}

pub fn render_board(frame: &BoardFrame, options: RenderOptions) -> String {
    Screen::list(frame, options).to_string()
}

pub fn render_ticker(frame: &BoardFrame) -> String {
    let entries: Vec<String> = frame
        .items
        .iter()
        .map(|projected| {
            format!(
                "{} — {}",
                projected.item.route_id,
                format_arrival(projected.eta_seconds)
            )
        })
        .collect();
    entries.join("      ")
}

/// The whole screen: header, optional clock, list, side panel and error.
pub fn render(frame: &BoardFrame, config: &BoardConfig, options: RenderOptions) -> String {
    Screen {
        frame,
        config: Some(config),
        options,
    }
    .to_string()
}

/// A screen without a config renders only the board list.
struct Screen<'a> {
    frame: &'a BoardFrame,
    config: Option<&'a BoardConfig>,
    options: RenderOptions,
}

impl<'a> Screen<'a> {
    fn list(frame: &'a BoardFrame, options: RenderOptions) -> Self {
        Screen {
            frame,
            config: None,
            options,
        }
    }

    fn write_header(&self, f: &mut fmt::Formatter<'_>, config: &BoardConfig) -> fmt::Result {
        let dark = config.theme.is_dark(self.options.system_dark);
        if self.options.ansi {
            let ((fr, fg, fb), (br, bg, bb)) = if dark { DARK_HEADER } else { LIGHT_HEADER };
            write!(f, "\x1b[38;2;{};{};{};48;2;{};{};{}m", fr, fg, fb, br, bg, bb)?;
        }
        write!(f, "{}", header(self.frame))?;
        if config.clock_visible {
            write!(f, "    {}", format_clock(self.frame.now, self.frame.offset))?;
        }
        if self.options.ansi {
            f.write_str("\x1b[0m")?;
        }
        f.write_str("\n\n")
    }
}

impl fmt::Display for Screen<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(config) = self.config else {
            return write_board(f, self.frame, self.options);
        };
        self.write_header(f, config)?;

        match config.view {
            ViewMode::Board => write_board(f, self.frame, self.options)?,
            ViewMode::Ticker => writeln!(f, "{}", render_ticker(self.frame))?,
        }

        writeln!(f, "\n{}", PROMO_TITLE)?;
        writeln!(f, "{}", PROMO_SUBTITLE)?;
        if config.qr_visible {
            writeln!(f, "QR: {}", QR_TARGET)?;
        }
        write!(f, "Тема: {}", config.theme)?;
        if config.theme == Theme::Auto {
            let resolved = if config.theme.is_dark(self.options.system_dark) {
                Theme::Dark
            } else {
                Theme::Light
            };
            write!(f, " ({})", resolved)?;
        }
        writeln!(f, "  (auto→light→dark)")?;
        if let Some(error) = &self.frame.error {
            writeln!(f, "Ошибка: {}", error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{ArrivalItem, StopIdentity},
        projector::ProjectedItem,
    };
    use chrono::{FixedOffset, TimeZone, Utc};

    fn projected(route_id: &str, route_name: Option<&str>, eta_seconds: u64) -> ProjectedItem {
        ProjectedItem {
            item: ArrivalItem {
                route_id: route_id.into(),
                route_type: RouteType::Minibus,
                route_name: route_name.map(str::to_owned),
                scheduled_time: None,
                arrival_in_minutes: Some(1),
                is_realtime: Some(true),
            },
            eta_seconds,
        }
    }

    fn frame(items: Vec<ProjectedItem>) -> BoardFrame {
        BoardFrame {
            identity: StopIdentity::new("Нальчик", "1"),
            stop_name: None,
            stop_city: None,
            now: Utc.with_ymd_and_hms(2025, 1, 12, 11, 7, 0).unwrap(),
            offset: FixedOffset::east_opt(3 * 3600).unwrap(),
            items,
            error: None,
            has_snapshot: true,
        }
    }

    #[test]
    fn header_falls_back_to_config_and_placeholder() {
        let mut frame = frame(vec![]);
        assert_eq!(header(&frame), "Нальчик, Остановка");
        frame.stop_name = Some("Ж/д вокзал".into());
        frame.stop_city = Some(String::new());
        assert_eq!(header(&frame), "Нальчик, Ж/д вокзал");
    }

    #[test]
    fn empty_board_says_so() {
        let out = render_board(&frame(vec![]), RenderOptions::default());
        assert!(out.contains(EMPTY_BOARD));
    }

    #[test]
    fn board_rows_show_name_or_type_label() {
        let frame = frame(vec![
            projected("130", Some("Маршрутка 130"), 30),
            projected("19", None, 660),
        ]);
        let out = render_board(&frame, RenderOptions::default());
        let rows: Vec<&str> = out.lines().skip(1).collect();
        assert!(rows[0].contains("130 Маршрутка 130"));
        assert!(rows[0].ends_with("≤1 мин"));
        assert!(rows[1].contains("19 Маршрутка"));
        assert!(rows[1].ends_with("11 мин"));
    }

    #[test]
    fn ansi_markers_use_route_colour() {
        let frame = frame(vec![projected("3", None, 840)]);
        let out = render_board(
            &frame,
            RenderOptions {
                ansi: true,
                system_dark: false,
            },
        );
        assert!(out.contains("\x1b[38;2;168;85;247m"));
    }

    #[test]
    fn ticker_lists_routes_in_order() {
        let frame = frame(vec![projected("130", None, 240), projected("33Ш", None, 3661)]);
        assert_eq!(render_ticker(&frame), "130 — 04 мин      33Ш — 01:01");
    }

    #[test]
    fn screen_respects_toggles() {
        let mut frame = frame(vec![projected("130", None, 240)]);
        frame.error = Some("API 500".into());
        let mut config = BoardConfig::default();
        let out = render(&frame, &config, RenderOptions::default());
        assert!(out.starts_with("Нальчик, Остановка    14:07"));
        assert!(out.contains(QR_TARGET));
        assert!(out.contains("Тема: auto (light)"));
        assert!(out.contains("Ошибка: API 500"));

        config.clock_visible = false;
        config.qr_visible = false;
        config.theme = Theme::Dark;
        config.view = ViewMode::Ticker;
        let out = render(&frame, &config, RenderOptions::default());
        assert!(!out.contains("14:07"));
        assert!(!out.contains(QR_TARGET));
        assert!(out.contains("Тема: dark"));
        assert!(out.contains("130 — 04 мин"));
    }

    #[test]
    fn auto_theme_resolves_from_system_preference() {
        let frame = frame(vec![]);
        let config = BoardConfig::default();
        let dark = RenderOptions {
            ansi: true,
            system_dark: true,
        };
        let out = render(&frame, &config, dark);
        assert!(out.starts_with("\x1b[38;2;241;245;249;48;2;15;23;42m"));
        assert!(out.contains("Тема: auto (dark)"));

        let mut light = config.clone();
        light.theme = Theme::Light;
        let out = render(&frame, &light, dark);
        assert!(out.starts_with("\x1b[38;2;15;23;42;48;2;248;250;252m"));
        assert!(out.contains("Тема: light  (auto→light→dark)"));
    }
}
