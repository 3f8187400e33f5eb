//! Calendar context: date header with the lunar date, today's festivals and
//! solar terms, and upcoming countdowns.

pub mod lunar;

use chrono::Datelike;
use chrono::Days;
use chrono::NaiveDate;
use chrono::Weekday;

use self::lunar::LunarDate;

/// How far ahead the countdown looks.
const UPCOMING_HORIZON_DAYS: u64 = 400;

/// Optional calendar collaborator consulted by the content pipeline.
///
/// Each method returns an empty string when it has nothing to say.
pub trait CalendarProvider: Send + Sync {
    /// e.g. `今天是 2026年1月1日 星期四 农历乙巳年冬月十三`.
    fn date_header(&self, date: NaiveDate) -> String;

    /// Today's solar term and festivals as `【a | b】`.
    fn today_special(&self, date: NaiveDate) -> String;

    /// Countdown block for the next `limit` festivals, one line each.
    fn upcoming_festivals(&self, date: NaiveDate, limit: usize) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FestivalType {
    Statutory,
    Solar,
    Western,
    Floating,
    Lunar,
    SolarTerm,
}

impl FestivalType {
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Statutory => "🎉",
            Self::Solar => "📆",
            Self::Western => "🌍",
            Self::Floating => "💐",
            Self::Lunar => "🏮",
            Self::SolarTerm => "🌿",
        }
    }
}

enum FestivalDate {
    Fixed { month: u32, day: u32 },
    /// The `n`th `weekday` of `month`.
    NthWeekday { month: u32, weekday: Weekday, n: u8 },
    Easter,
}

struct Festival {
    name: &'static str,
    kind: FestivalType,
    date: FestivalDate,
}

const fn fixed(month: u32, day: u32, name: &'static str, kind: FestivalType) -> Festival {
    Festival {
        name,
        kind,
        date: FestivalDate::Fixed { month, day },
    }
}

const FESTIVALS: &[Festival] = &[
    fixed(1, 1, "元旦", FestivalType::Statutory),
    fixed(2, 14, "情人节", FestivalType::Western),
    fixed(3, 8, "妇女节", FestivalType::Solar),
    fixed(3, 12, "植树节", FestivalType::Solar),
    fixed(4, 1, "愚人节", FestivalType::Western),
    fixed(5, 1, "劳动节", FestivalType::Statutory),
    fixed(5, 4, "青年节", FestivalType::Solar),
    fixed(6, 1, "儿童节", FestivalType::Solar),
    fixed(7, 1, "建党节", FestivalType::Solar),
    fixed(8, 1, "建军节", FestivalType::Solar),
    fixed(9, 10, "教师节", FestivalType::Solar),
    fixed(10, 1, "国庆节", FestivalType::Statutory),
    fixed(10, 31, "万圣节", FestivalType::Western),
    fixed(12, 25, "圣诞节", FestivalType::Western),
    Festival {
        name: "母亲节",
        kind: FestivalType::Floating,
        date: FestivalDate::NthWeekday {
            month: 5,
            weekday: Weekday::Sun,
            n: 2,
        },
    },
    Festival {
        name: "父亲节",
        kind: FestivalType::Floating,
        date: FestivalDate::NthWeekday {
            month: 6,
            weekday: Weekday::Sun,
            n: 3,
        },
    },
    Festival {
        name: "感恩节",
        kind: FestivalType::Floating,
        date: FestivalDate::NthWeekday {
            month: 11,
            weekday: Weekday::Thu,
            n: 4,
        },
    },
    Festival {
        name: "复活节",
        kind: FestivalType::Floating,
        date: FestivalDate::Easter,
    },
];

struct LunarFestival {
    month: u32,
    day: u32,
    name: &'static str,
    kind: FestivalType,
}

const fn lunar_day(month: u32, day: u32, name: &'static str, kind: FestivalType) -> LunarFestival {
    LunarFestival {
        month,
        day,
        name,
        kind,
    }
}

const LUNAR_FESTIVALS: &[LunarFestival] = &[
    lunar_day(1, 1, "春节", FestivalType::Statutory),
    lunar_day(1, 15, "元宵节", FestivalType::Lunar),
    lunar_day(2, 2, "龙抬头", FestivalType::Lunar),
    lunar_day(5, 5, "端午节", FestivalType::Statutory),
    lunar_day(7, 7, "七夕节", FestivalType::Lunar),
    lunar_day(7, 15, "中元节", FestivalType::Lunar),
    lunar_day(8, 15, "中秋节", FestivalType::Statutory),
    lunar_day(9, 9, "重阳节", FestivalType::Lunar),
    lunar_day(12, 8, "腊八节", FestivalType::Lunar),
    lunar_day(12, 23, "小年", FestivalType::Lunar),
];

/// The last day of the lunar year, whether 腊月 has 29 or 30 days.
const NEW_YEARS_EVE: &str = "除夕";

/// Solar terms that are also public holidays.
const STATUTORY_TERMS: &[&str] = &["清明"];

impl Festival {
    fn in_year(&self, year: i32) -> Option<NaiveDate> {
        match self.date {
            FestivalDate::Fixed { month, day } => NaiveDate::from_ymd_opt(year, month, day),
            FestivalDate::NthWeekday { month, weekday, n } => {
                NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
            }
            FestivalDate::Easter => easter(year),
        }
    }
}

/// Anonymous Gregorian algorithm.
fn easter(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

fn weekday_cn(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "星期一",
        Weekday::Tue => "星期二",
        Weekday::Wed => "星期三",
        Weekday::Thu => "星期四",
        Weekday::Fri => "星期五",
        Weekday::Sat => "星期六",
        Weekday::Sun => "星期日",
    }
}

/// Every solar term and festival falling on `date`, terms first, then lunar
/// festivals, then Gregorian ones.
fn observances(date: NaiveDate) -> Vec<(&'static str, FestivalType)> {
    let mut found = Vec::new();

    if let Some(term) = lunar::solar_term_on(date) {
        let kind = if STATUTORY_TERMS.contains(&term) {
            FestivalType::Statutory
        } else {
            FestivalType::SolarTerm
        };
        found.push((term, kind));
    }

    let today = LunarDate::from_solar(date);
    if !today.leap {
        found.extend(
            LUNAR_FESTIVALS
                .iter()
                .filter(|f| f.month == today.month && f.day == today.day)
                .map(|f| (f.name, f.kind)),
        );
    }
    if let Some(tomorrow) = date.checked_add_days(Days::new(1)) {
        let next = LunarDate::from_solar(tomorrow);
        if next.month == 1 && next.day == 1 && !next.leap {
            found.push((NEW_YEARS_EVE, FestivalType::Lunar));
        }
    }

    found.extend(
        FESTIVALS
            .iter()
            .filter(|f| f.in_year(date.year()) == Some(date))
            .map(|f| (f.name, f.kind)),
    );
    found
}

/// Gregorian and lunar festivals plus the 24 solar terms, reckoned in China
/// Standard Time.
#[derive(Debug, Clone, Default)]
pub struct ChineseCalendar;

impl ChineseCalendar {
    pub fn new() -> Self {
        Self
    }
}

impl CalendarProvider for ChineseCalendar {
    fn date_header(&self, date: NaiveDate) -> String {
        format!(
            "今天是 {}年{}月{}日 {} 农历{}",
            date.year(),
            date.month(),
            date.day(),
            weekday_cn(date.weekday()),
            LunarDate::from_solar(date)
        )
    }

    fn today_special(&self, date: NaiveDate) -> String {
        let names: Vec<&str> = observances(date).into_iter().map(|(name, _)| name).collect();
        if names.is_empty() {
            return String::new();
        }
        format!("【{}】", names.join(" | "))
    }

    fn upcoming_festivals(&self, date: NaiveDate, limit: usize) -> String {
        let mut upcoming: Vec<(u64, &str, FestivalType)> = Vec::new();
        for offset in 0..UPCOMING_HORIZON_DAYS {
            if upcoming.len() >= limit {
                break;
            }
            let Some(day) = date.checked_add_days(Days::new(offset)) else {
                break;
            };
            upcoming.extend(
                observances(day)
                    .into_iter()
                    .map(|(name, kind)| (offset, name, kind)),
            );
        }

        if upcoming.is_empty() || limit == 0 {
            return String::new();
        }

        let mut out = String::from("📅 近期节日/节气：\n");
        for (days, name, kind) in upcoming.into_iter().take(limit) {
            let emoji = kind.emoji();
            if days == 0 {
                out.push_str(&format!("{emoji} 今天是{name}！\n"));
            } else {
                out.push_str(&format!("{emoji} 还有{days}天到{name}\n"));
            }
        }
        out
    }
}
