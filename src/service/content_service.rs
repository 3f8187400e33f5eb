//! Reminder message generation: AI completion first, deterministic template second.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use derive_builder::Builder;
use log::debug;
use log::warn;
use tokio::time::Instant;

use crate::calendar::CalendarProvider;
use crate::completion::CompletionClient;
use crate::entity::TodoModel;
use crate::weather::model::AirQuality;
use crate::weather::model::Alert;
use crate::weather::model::CurrentWeather;
use crate::weather::model::LifeIndex;

const AI_UNAVAILABLE_NOTICE: &str = "\n---\n(AI 服务暂不可用，使用默认模板)";

const SYSTEM_PROMPT: &str = r#"你是一个友善的每日提醒助手。你的任务是根据提供的日期、天气数据和待办事项，生成一条温馨、自然的提醒消息。

要求：
1. 开头根据现在的时间给予问候（比如早上好、中午好等），展示今日日期，如有节日要特别提及
2. 如果临近重要节日/假期，给予温馨提示（如"还有X天就放假啦"）
3. 如果有天气预警，必须在开头用醒目的方式提醒用户注意，说明预警类型、等级和简要建议
4. 详细解读天气状况：
   - 重点关注实际温度与体感温度的差异，如果相差较大需特别说明原因（风力、湿度等）
   - 根据风力等级和风速给出具体影响提示（如3级以上建议注意防风）
   - 结合湿度说明体感舒适度（如高湿度闷热、低湿度干燥）
5. 充分利用生活指数给出实用建议：穿衣、防晒、运动
6. 根据空气质量给出健康建议，空气质量差时提醒减少户外活动或佩戴口罩
7. 自然地提及今日待办事项
8. 保持积极正面、温暖友善的语气，使用适当的 emoji
9. 总长度控制在 400 字以内
10. 使用中文回复"#;

const PROMPT_FOOTER: &str = "请特别注意：
1. 如果有天气预警，必须在开头醒目提醒，说明预警内容和应对建议
2. 如果实际温度与体感温度相差较大（≥3°C），请重点说明并解释原因
3. 根据风速和风力等级判断是否需要提醒防风
4. 根据湿度水平说明体感舒适度（<30%干燥，>70%潮湿闷热）
5. 根据AQI等级给出健康建议
6. 如果有待办事项，要自然地融入提醒中，不要生硬列举";

/// Everything the generator needs for one subscription's reminder.
#[derive(Builder, Clone, Debug)]
#[builder(pattern = "owned", setter(into))]
pub struct ReminderContext {
    pub city: String,
    /// Local date of the delivery.
    pub date: NaiveDate,
    /// Local delivery time, `HH:MM`.
    pub time: String,
    pub weather: CurrentWeather,
    #[builder(default)]
    pub life_indices: Vec<LifeIndex>,
    #[builder(default)]
    pub air_quality: Option<AirQuality>,
    #[builder(default)]
    pub alerts: Vec<Alert>,
    #[builder(default)]
    pub todos: Vec<TodoModel>,
}

/// Builds reminder bodies.
///
/// The AI tier is used only when a completion client is configured. Every
/// failure path ends in the template, so generation itself cannot fail.
pub struct ContentService {
    completion: Option<Arc<dyn CompletionClient>>,
    calendar: Option<Arc<dyn CalendarProvider>>,
    max_retries: u32,
}

impl ContentService {
    pub fn new(
        completion: Option<Arc<dyn CompletionClient>>,
        calendar: Option<Arc<dyn CalendarProvider>>,
        max_retries: u32,
    ) -> Self {
        Self {
            completion,
            calendar,
            max_retries: max_retries.max(1),
        }
    }

    pub fn ai_enabled(&self) -> bool {
        self.completion.is_some()
    }

    /// Generates the reminder for `ctx`, giving the AI tier until `deadline`.
    pub async fn generate(&self, ctx: &ReminderContext, deadline: Instant) -> String {
        if let Some(client) = &self.completion {
            let user_prompt = self.user_prompt(ctx);
            if let Some(content) = self
                .complete_with_retry(client.as_ref(), &user_prompt, deadline)
                .await
            {
                return content;
            }
            warn!(
                "AI generation failed for {}, falling back to template",
                ctx.city
            );
        }
        self.render_template(ctx, self.ai_enabled())
    }

    /// Up to `max_retries` attempts with `2^attempt` second pauses in between.
    async fn complete_with_retry(
        &self,
        client: &dyn CompletionClient,
        user_prompt: &str,
        deadline: Instant,
    ) -> Option<String> {
        for attempt in 0..self.max_retries {
            match client.complete(SYSTEM_PROMPT, user_prompt, deadline).await {
                Ok(content) => return Some(content),
                Err(e) => warn!(
                    "Completion attempt {}/{} failed: {}",
                    attempt + 1,
                    self.max_retries,
                    e
                ),
            }

            if attempt + 1 < self.max_retries {
                let backoff = Duration::from_secs(1 << attempt.min(16));
                if Instant::now() + backoff >= deadline {
                    debug!("Skipping remaining completion attempts, deadline too close");
                    return None;
                }
                tokio::time::sleep(backoff).await;
            }
        }
        None
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    /// Structured prompt with date, alerts, weather, air quality, indices and todos.
    pub fn user_prompt(&self, ctx: &ReminderContext) -> String {
        let calendar_info = match &self.calendar {
            Some(calendar) => {
                let mut info = calendar.date_header(ctx.date);
                let special = calendar.today_special(ctx.date);
                if !special.is_empty() {
                    let _ = write!(info, "\n今日节日：{special}");
                }
                let upcoming = calendar.upcoming_festivals(ctx.date, 3);
                if !upcoming.is_empty() {
                    let _ = write!(info, "\n{}", upcoming.trim_end());
                }
                info
            }
            None => format!("日期: {}", ctx.date.format("%Y-%m-%d")),
        };

        let w = &ctx.weather;
        let delta = w
            .feels_like_delta()
            .map(|d| format!("（体感与实际温差 {d:+.1}°C）"))
            .unwrap_or_default();
        let weather_info = format!(
            "城市: {}\n日期: {}\n时间: {}\n实际温度: {}°C\n体感温度: {}°C {}\n天气状况: {}\n相对湿度: {}%\n风向风力: {} {}级 (风速 {} km/h)",
            ctx.city,
            ctx.date.format("%Y-%m-%d"),
            ctx.time,
            w.temp,
            w.feels_like,
            delta,
            w.text,
            w.humidity,
            w.wind_dir,
            w.wind_scale,
            w.wind_speed,
        );

        let alerts_info = if ctx.alerts.is_empty() {
            "当前无天气预警".to_string()
        } else {
            ctx.alerts
                .iter()
                .map(|a| {
                    let mut line = format!(
                        "• 预警类型：{}\n  级别：{}\n  颜色：{}\n  内容：{}",
                        a.type_name, a.level, a.severity_color, a.title
                    );
                    if !a.text.is_empty() {
                        let _ = write!(line, "\n  详情：{}", a.text);
                    }
                    line
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let air_info = match &ctx.air_quality {
            Some(air) => {
                let mut info = format!(
                    "• AQI：{:.0}\n• 等级：{}\n• 类别：{}",
                    air.aqi, air.level, air.category
                );
                if let Some(pollutant) = &air.primary_pollutant {
                    let _ = write!(info, "\n• 主要污染物：{pollutant}");
                }
                info
            }
            None => "暂无空气质量数据".to_string(),
        };

        let mut indices: Vec<&LifeIndex> = ctx.life_indices.iter().collect();
        indices.sort_by_key(|idx| idx.kind.prompt_priority());
        let indices_info = if indices.is_empty() {
            "暂无生活指数数据".to_string()
        } else {
            indices
                .iter()
                .map(|idx| {
                    if idx.kind.is_highlighted() {
                        format!(
                            "• {}：等级 {}，{}\n  详细建议：{}",
                            idx.name, idx.level, idx.category, idx.text
                        )
                    } else {
                        format!("• {}：{}\n  {}", idx.name, idx.category, idx.text)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let todos_info = if ctx.todos.is_empty() {
            "今日暂无待办事项".to_string()
        } else {
            ctx.todos
                .iter()
                .enumerate()
                .map(|(i, todo)| format!("{}. {}", i + 1, todo.content))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            "请根据以下信息生成今日提醒：\n\n【日期信息】\n{calendar_info}\n\n【天气预警】\n{alerts_info}\n\n【天气信息】\n{weather_info}\n\n【空气质量】\n{air_info}\n\n【生活指数】\n{indices_info}\n\n【待办事项】\n{todos_info}\n\n{PROMPT_FOOTER}"
        )
    }

    /// Deterministic reminder body.
    pub fn render_template(&self, ctx: &ReminderContext, ai_failed: bool) -> String {
        let mut out = String::new();

        if !ctx.alerts.is_empty() {
            out.push_str("🚨 天气预警：\n");
            for alert in &ctx.alerts {
                let _ = writeln!(out, "{} {}", alert.severity_emoji(), alert.title);
            }
            out.push('\n');
        }

        out.push_str(&self.date_section(ctx.date));

        let w = &ctx.weather;
        let _ = write!(
            out,
            "📍 {} 天气播报\n\n🌡️ 温度：{}°C（体感 {}°C）\n☁️ 天气：{}\n💧 湿度：{}%\n🌬️ 风向：{} {}级（{} km/h）\n\n",
            ctx.city, w.temp, w.feels_like, w.text, w.humidity, w.wind_dir, w.wind_scale, w.wind_speed
        );

        let highlighted: Vec<&LifeIndex> = ctx
            .life_indices
            .iter()
            .filter(|idx| idx.kind.is_highlighted())
            .collect();
        if !highlighted.is_empty() {
            out.push_str("📋 生活指数：\n");
            for idx in highlighted {
                let _ = writeln!(out, "{} {}：{}", idx.kind.emoji(), idx.name, idx.category);
                if !idx.text.is_empty() {
                    let _ = writeln!(out, "   {}", idx.text);
                }
            }
            out.push('\n');
        }

        if let Some(air) = &ctx.air_quality {
            let _ = write!(out, "🌫️ 空气质量：AQI {:.0}（{}）", air.aqi, air.category);
            if let Some(pollutant) = &air.primary_pollutant {
                let _ = write!(out, "，主要污染物：{pollutant}");
            }
            out.push_str("\n\n");
        }

        out.push_str(&format_todo_list(&ctx.todos));

        if ai_failed {
            out.push_str(AI_UNAVAILABLE_NOTICE);
        }
        out
    }

    /// Reminder used when the location or the current weather is unavailable.
    pub fn render_fallback(&self, date: NaiveDate, notice: &str, todos: &[TodoModel]) -> String {
        let mut out = self.date_section(date);
        out.push_str(notice);
        out.push_str("\n\n");
        out.push_str(&format_todo_list(todos));
        out
    }

    fn date_section(&self, date: NaiveDate) -> String {
        let Some(calendar) = &self.calendar else {
            return format!("📆 {}\n\n", date.format("%Y-%m-%d"));
        };

        let mut out = format!("📆 {}\n", calendar.date_header(date));
        let special = calendar.today_special(date);
        if !special.is_empty() {
            let _ = writeln!(out, "🎊 {special}");
        }
        out.push('\n');
        let upcoming = calendar.upcoming_festivals(date, 3);
        if !upcoming.is_empty() {
            out.push_str(&upcoming);
            out.push('\n');
        }
        out
    }
}

pub fn location_failure_notice(city: &str) -> String {
    format!("⚠️ 无法获取 {city} 的位置信息")
}

pub fn weather_failure_notice(city: &str) -> String {
    format!("⚠️ 无法获取 {city} 的天气信息")
}

pub fn format_todo_list(todos: &[TodoModel]) -> String {
    if todos.is_empty() {
        return "📝 暂无待办事项".to_string();
    }

    let mut out = String::from("📝 待办事项列表：\n\n");
    for (i, todo) in todos.iter().enumerate() {
        let status = if todo.completed { "✅" } else { "⬜" };
        let _ = writeln!(out, "{}. {} {}", i + 1, status, todo.content);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionError;
    use crate::completion::MockCompletionClient;
    use crate::weather::model::LifeIndexKind;

    fn context() -> ReminderContext {
        ReminderContextBuilder::default()
            .city("北京")
            .date(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap())
            .time("08:00")
            .weather(CurrentWeather {
                temp: "5".into(),
                feels_like: "1".into(),
                text: "晴".into(),
                humidity: "30".into(),
                wind_dir: "北风".into(),
                wind_scale: "3".into(),
                wind_speed: "15".into(),
            })
            .life_indices(vec![
                LifeIndex {
                    kind: LifeIndexKind::Sports,
                    name: "运动指数".into(),
                    level: "2".into(),
                    category: "较适宜".into(),
                    text: "注意保暖".into(),
                },
                LifeIndex {
                    kind: LifeIndexKind::Other("8".into()),
                    name: "舒适度指数".into(),
                    level: "1".into(),
                    category: "舒适".into(),
                    text: String::new(),
                },
                LifeIndex {
                    kind: LifeIndexKind::Dressing,
                    name: "穿衣指数".into(),
                    level: "6".into(),
                    category: "寒冷".into(),
                    text: "建议着羽绒服".into(),
                },
            ])
            .todos(vec![TodoModel {
                id: 1,
                subscription_id: 1,
                content: "买牛奶".into(),
                ..Default::default()
            }])
            .build()
            .unwrap()
    }

    #[test]
    fn test_template_order_and_highlights() {
        let service = ContentService::new(None, None, 3);
        let text = service.render_template(&context(), false);

        assert!(text.starts_with("📆 2026-03-02\n"));
        let weather_at = text.find("📍 北京 天气播报").unwrap();
        let indices_at = text.find("📋 生活指数：").unwrap();
        let todos_at = text.find("📝 待办事项列表：").unwrap();
        assert!(weather_at < indices_at && indices_at < todos_at);
        assert!(text.contains("🏃 运动指数：较适宜"));
        assert!(text.contains("👔 穿衣指数：寒冷"));
        assert!(!text.contains("舒适度指数"));
        assert!(text.contains("1. ⬜ 买牛奶"));
        assert!(!text.contains("AI 服务暂不可用"));
    }

    #[test]
    fn test_hazard_banner_comes_first() {
        let service = ContentService::new(None, None, 3);
        let mut ctx = context();
        ctx.alerts = vec![Alert {
            id: "1".into(),
            title: "北京市气象台发布大风蓝色预警".into(),
            severity_color: "Blue".into(),
            ..Default::default()
        }];
        let text = service.render_template(&ctx, false);
        assert!(text.starts_with("🚨 天气预警：\n🔵 北京市气象台发布大风蓝色预警\n"));
    }

    #[test]
    fn test_prompt_orders_indices_and_reports_delta() {
        let service = ContentService::new(None, None, 3);
        let prompt = service.user_prompt(&context());

        let dressing = prompt.find("穿衣指数").unwrap();
        let sports = prompt.find("运动指数").unwrap();
        let other = prompt.find("舒适度指数").unwrap();
        assert!(dressing < sports && sports < other);
        assert!(prompt.contains("体感与实际温差 -4.0°C"));
        assert!(prompt.contains("【待办事项】\n1. 买牛奶"));
        assert!(prompt.contains("暂无空气质量数据"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_then_template() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .times(3)
            .returning(|_, _, _| Err(CompletionError::EmptyResponse));

        let service = ContentService::new(Some(Arc::new(client)), None, 3);
        let start = Instant::now();
        let text = service
            .generate(&context(), start + Duration::from_secs(60))
            .await;

        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert!(text.starts_with("📆 "));
        assert!(text.ends_with(AI_UNAVAILABLE_NOTICE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ai_output_is_returned_verbatim() {
        let mut client = MockCompletionClient::new();
        client
            .expect_complete()
            .times(1)
            .returning(|_, _, _| Ok("早上好！".to_string()));

        let service = ContentService::new(Some(Arc::new(client)), None, 3);
        let text = service
            .generate(&context(), Instant::now() + Duration::from_secs(60))
            .await;
        assert_eq!(text, "早上好！");
    }

    #[test]
    fn test_fallback_shape() {
        let service = ContentService::new(None, None, 3);
        let todos = context().todos;
        let text = service.render_fallback(
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            &location_failure_notice("火星"),
            &todos,
        );
        assert_eq!(
            text,
            "📆 2026-03-02\n\n⚠️ 无法获取 火星 的位置信息\n\n📝 待办事项列表：\n\n1. ⬜ 买牛奶\n"
        );
    }
}
