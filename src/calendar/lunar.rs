//! Chinese lunisolar dates and solar terms.
//!
//! Months start on the local day of a true new moon. Month 11 is the one
//! holding the winter solstice, and in a 13-month year the first month without
//! a principal term is the leap month. New moons and the apparent solar
//! longitude use the series from Meeus, *Astronomical Algorithms* (ch. 25, 49),
//! reckoned in China Standard Time.

use std::fmt;

use chrono::Datelike;
use chrono::NaiveDate;

/// UTC+8 as a fraction of a day.
const CST_OFFSET: f64 = 8.0 / 24.0;
const SYNODIC_MONTH: f64 = 29.530588861;
/// JDE of lunation 0, the new moon of 2000-01-06.
const LUNATION_EPOCH: f64 = 2451550.09766;
const J2000: f64 = 2451545.0;

const STEMS: [&str; 10] = ["甲", "乙", "丙", "丁", "戊", "己", "庚", "辛", "壬", "癸"];
const BRANCHES: [&str; 12] = [
    "子", "丑", "寅", "卯", "辰", "巳", "午", "未", "申", "酉", "戌", "亥",
];
const ZODIAC: [&str; 12] = [
    "鼠", "牛", "虎", "兔", "龙", "蛇", "马", "羊", "猴", "鸡", "狗", "猪",
];
const MONTHS: [&str; 12] = [
    "正", "二", "三", "四", "五", "六", "七", "八", "九", "十", "冬", "腊",
];
const DIGITS: [&str; 10] = ["", "一", "二", "三", "四", "五", "六", "七", "八", "九"];

/// The 24 terms, starting at solar longitude 0° and stepping 15°.
const SOLAR_TERMS: [&str; 24] = [
    "春分", "清明", "谷雨", "立夏", "小满", "芒种", "夏至", "小暑", "大暑", "立秋", "处暑", "白露",
    "秋分", "寒露", "霜降", "立冬", "小雪", "大雪", "冬至", "小寒", "大寒", "立春", "雨水", "惊蛰",
];

/// Lunisolar date. `year` is the Gregorian year in which the lunar year starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LunarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub leap: bool,
}

impl LunarDate {
    pub fn from_solar(date: NaiveDate) -> Self {
        let day_number = julian_day_number(date);
        let (month_k, month_start) = lunation_containing(day_number);

        let year = date.year();
        let (mut eleventh_k, mut eleventh) = eleventh_month(year);
        let mut next_eleventh = eleventh;
        let mut lunar_year;
        if eleventh >= month_start {
            lunar_year = year;
            (eleventh_k, eleventh) = eleventh_month(year - 1);
        } else {
            lunar_year = year + 1;
            next_eleventh = eleventh_month(year + 1).1;
        }

        let diff = month_k - eleventh_k;
        let mut month = diff + 11;
        let mut leap = false;
        if next_eleventh - eleventh > 365 {
            let leap_offset = leap_month_offset(eleventh_k);
            if diff >= leap_offset {
                month = diff + 10;
                leap = diff == leap_offset;
            }
        }
        if month > 12 {
            month -= 12;
        }
        if month >= 11 && diff < 4 {
            lunar_year -= 1;
        }

        Self {
            year: lunar_year,
            month: month as u32,
            day: (day_number - month_start + 1) as u32,
            leap,
        }
    }

    fn cycle_index(&self) -> usize {
        (self.year - 4).rem_euclid(60) as usize
    }

    /// Sexagenary name of the year, e.g. `甲辰`.
    pub fn ganzhi(&self) -> String {
        let n = self.cycle_index();
        format!("{}{}", STEMS[n % 10], BRANCHES[n % 12])
    }

    pub fn zodiac(&self) -> &'static str {
        ZODIAC[self.cycle_index() % 12]
    }

    /// e.g. `腊月`, `闰二月`.
    pub fn month_name(&self) -> String {
        let name = MONTHS[(self.month as usize + 11) % 12];
        if self.leap {
            format!("闰{name}月")
        } else {
            format!("{name}月")
        }
    }

    /// e.g. `初一`, `十五`, `廿九`.
    pub fn day_name(&self) -> String {
        let d = self.day as usize;
        match d {
            10 => "初十".to_string(),
            20 => "二十".to_string(),
            30 => "三十".to_string(),
            1..=9 => format!("初{}", DIGITS[d]),
            11..=19 => format!("十{}", DIGITS[d - 10]),
            _ => format!("廿{}", DIGITS[d % 10]),
        }
    }
}

impl fmt::Display for LunarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}年{}{}", self.ganzhi(), self.month_name(), self.day_name())
    }
}

/// Solar term whose instant falls on `date`, if any.
pub fn solar_term_on(date: NaiveDate) -> Option<&'static str> {
    let day = julian_day_number(date);
    let before = term_index(day);
    let after = term_index(day + 1);
    (before != after).then_some(SOLAR_TERMS[after])
}

fn term_index(day: i64) -> usize {
    ((longitude_at_day_start(day) / 15.0).floor() as usize) % 24
}

fn julian_day_number(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) + 1_721_425
}

/// Day number of Dec 31 of the Gregorian `year`.
fn december_31(year: i32) -> i64 {
    let y = i64::from(year) + 4800;
    let m = 9;
    31 + (153 * m + 2) / 5 + 365 * y + y / 4 - y / 100 + y / 400 - 32045
}

/// ΔT = TT − UT in days, Espenak & Meeus polynomial for 2005–2050.
fn delta_t(jd: f64) -> f64 {
    let t = (jd - J2000) / 365.25;
    (62.92 + 0.32217 * t + 0.005589 * t * t) / 86_400.0
}

/// JDE of the true new moon of lunation `k`.
fn new_moon_jde(k: i64) -> f64 {
    let k = k as f64;
    let t = k / 1236.85;
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;

    let mean = LUNATION_EPOCH + SYNODIC_MONTH * k + 0.00015437 * t2 - 0.000000150 * t3
        + 0.00000000073 * t4;
    let e = 1.0 - 0.002516 * t - 0.0000074 * t2;
    let m = (2.5534 + 29.10535670 * k - 0.0000014 * t2 - 0.00000011 * t3).to_radians();
    let mp = (201.5643 + 385.81693528 * k + 0.0107582 * t2 + 0.00001238 * t3
        - 0.000000058 * t4)
        .to_radians();
    let f = (160.7108 + 390.67050284 * k - 0.0016118 * t2 - 0.00000227 * t3
        + 0.000000011 * t4)
        .to_radians();
    let omega = (124.7746 - 1.56375588 * k + 0.0020672 * t2 + 0.00000215 * t3).to_radians();

    let periodic = -0.40720 * mp.sin() + 0.17241 * e * m.sin() + 0.01608 * (2.0 * mp).sin()
        + 0.01039 * (2.0 * f).sin()
        + 0.00739 * e * (mp - m).sin()
        - 0.00514 * e * (mp + m).sin()
        + 0.00208 * e * e * (2.0 * m).sin()
        - 0.00111 * (mp - 2.0 * f).sin()
        - 0.00057 * (mp + 2.0 * f).sin()
        + 0.00056 * e * (2.0 * mp + m).sin()
        - 0.00042 * (3.0 * mp).sin()
        + 0.00042 * e * (m + 2.0 * f).sin()
        + 0.00038 * e * (m - 2.0 * f).sin()
        - 0.00024 * e * (2.0 * mp - m).sin()
        - 0.00017 * omega.sin()
        - 0.00007 * (mp + 2.0 * m).sin()
        + 0.00004 * (2.0 * mp - 2.0 * f).sin()
        + 0.00004 * (3.0 * m).sin()
        + 0.00003 * (mp + m - 2.0 * f).sin()
        + 0.00003 * (2.0 * mp + 2.0 * f).sin()
        - 0.00003 * (mp + m + 2.0 * f).sin()
        + 0.00003 * (mp - m + 2.0 * f).sin()
        - 0.00002 * (mp - m - 2.0 * f).sin()
        - 0.00002 * (3.0 * mp + m).sin()
        + 0.00002 * (4.0 * mp).sin();

    let planetary: f64 = [
        (299.77 + 0.107408 * k - 0.009173 * t2, 0.000325),
        (251.88 + 0.016321 * k, 0.000165),
        (251.83 + 26.651886 * k, 0.000164),
        (349.42 + 36.412478 * k, 0.000126),
        (84.66 + 18.206239 * k, 0.000110),
        (141.74 + 53.303771 * k, 0.000062),
        (207.14 + 2.453732 * k, 0.000060),
        (154.84 + 7.306860 * k, 0.000056),
        (34.52 + 27.261239 * k, 0.000047),
        (207.19 + 0.121824 * k, 0.000042),
        (291.34 + 1.844379 * k, 0.000040),
        (161.72 + 24.198154 * k, 0.000037),
        (239.56 + 25.513099 * k, 0.000035),
        (331.55 + 3.592518 * k, 0.000023),
    ]
    .iter()
    .map(|(arg, coefficient)| coefficient * arg.to_radians().sin())
    .sum();

    mean + periodic + planetary
}

/// Local day number on which lunation `k` begins.
fn new_moon_day(k: i64) -> i64 {
    let jde = new_moon_jde(k);
    let ut = jde - delta_t(jde);
    (ut + 0.5 + CST_OFFSET).floor() as i64
}

/// Lunation whose month contains local day `day`, with its first day.
fn lunation_containing(day: i64) -> (i64, i64) {
    let mut k = ((day as f64 - LUNATION_EPOCH) / SYNODIC_MONTH).floor() as i64 + 2;
    loop {
        let start = new_moon_day(k);
        if start <= day {
            return (k, start);
        }
        k -= 1;
    }
}

/// Apparent geocentric longitude of the sun in degrees (Meeus ch. 25).
fn sun_longitude(jde: f64) -> f64 {
    let t = (jde - J2000) / 36525.0;
    let l0 = 280.46646 + 36000.76983 * t + 0.0003032 * t * t;
    let m = (357.52911 + 35999.05029 * t - 0.0001537 * t * t).to_radians();
    let c = (1.914602 - 0.004817 * t - 0.000014 * t * t) * m.sin()
        + (0.019993 - 0.000101 * t) * (2.0 * m).sin()
        + 0.000289 * (3.0 * m).sin();
    let omega = (125.04 - 1934.136 * t).to_radians();
    (l0 + c - 0.00569 - 0.00478 * omega.sin()).rem_euclid(360.0)
}

/// Solar longitude at local midnight opening day `day`.
fn longitude_at_day_start(day: i64) -> f64 {
    let ut = day as f64 - 0.5 - CST_OFFSET;
    sun_longitude(ut + delta_t(ut))
}

/// Principal terms sit on multiples of 30°.
fn principal_sector(day: i64) -> i64 {
    (longitude_at_day_start(day) / 30.0).floor() as i64
}

/// Lunation and first day of the month holding `year`'s winter solstice.
fn eleventh_month(year: i32) -> (i64, i64) {
    let (k, start) = lunation_containing(december_31(year));
    if principal_sector(start) >= 9 {
        (k - 1, new_moon_day(k - 1))
    } else {
        (k, start)
    }
}

/// Months after the eleventh month until the first one with no principal term.
fn leap_month_offset(eleventh_k: i64) -> i64 {
    let mut last = principal_sector(new_moon_day(eleventh_k + 1));
    for i in 2..=14 {
        let sector = principal_sector(new_moon_day(eleventh_k + i));
        if sector == last {
            return i - 1;
        }
        last = sector;
    }
    13
}
